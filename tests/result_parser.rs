use fc_league::Rejection;
use fc_league::result_parser::parse_statement;

fn words(raw: &str) -> Vec<&str> {
    raw.split_whitespace().collect()
}

#[test]
fn win_is_swapped_to_reporter_first() {
    let report = parse_statement(&words("я выиграл @bob 1:3")).expect("win should parse");
    assert_eq!(report.opponent, "bob");
    assert_eq!(report.score, (3, 1));
}

#[test]
fn loss_keeps_reporter_below() {
    let report = parse_statement(&words("я проиграл @bob 1:3")).expect("loss should parse");
    assert_eq!(report.opponent, "bob");
    assert_eq!(report.score, (1, 3));

    let report = parse_statement(&words("lost to @bob 4:2")).expect("english loss should parse");
    assert_eq!(report.score, (2, 4));
}

#[test]
fn draw_needs_equal_halves() {
    let report = parse_statement(&words("сыграл вничью с @bob 2:2")).expect("draw should parse");
    assert_eq!(report.score, (2, 2));

    let err = parse_statement(&words("сыграл вничью @bob 2:3")).unwrap_err();
    assert_eq!(err, Rejection::Unparsable);
}

#[test]
fn decisive_result_with_level_score_is_rejected() {
    assert_eq!(
        parse_statement(&words("won against @bob 1:1")).unwrap_err(),
        Rejection::Unparsable
    );
}

#[test]
fn missing_signal_is_rejected() {
    assert!(parse_statement(&words("выиграл 2:0")).is_err());
    assert!(parse_statement(&words("выиграл @bob")).is_err());
    assert!(parse_statement(&words("@bob 2:0")).is_err());
    assert!(parse_statement::<&str>(&[]).is_err());
}

#[test]
fn first_occurrence_of_each_signal_wins() {
    let report =
        parse_statement(&words("won @alice 2:1 @bob 5:0")).expect("statement should parse");
    assert_eq!(report.opponent, "alice");
    assert_eq!(report.score, (2, 1));
}

#[test]
fn tokens_are_matched_case_insensitively() {
    let report = parse_statement(&words("WON @Bob 0:3")).expect("statement should parse");
    assert_eq!(report.opponent, "bob");
    assert_eq!(report.score, (3, 0));
}

use std::collections::HashMap;

use crate::bracket::{Podium, aggregate, bracket_slots};
use crate::draw::group_tag;
use crate::record::{Fixture, Record, Round};
use crate::standings::Item;

/// Id → display handle; unknown ids print as themselves.
#[derive(Debug, Clone, Default)]
pub struct Names(HashMap<String, String>);

impl Names {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn get<'a>(&'a self, id: &'a str) -> &'a str {
        self.0.get(id).map(String::as_str).unwrap_or(id)
    }

    fn slot<'a>(&'a self, id: Option<&'a str>) -> &'a str {
        id.map(|id| self.get(id)).unwrap_or("?")
    }
}

pub fn group_draw_announcement(groups: &[Vec<String>], names: &Names) -> String {
    let mut out = String::from("Group draw results\n");
    for (index, group) in groups.iter().enumerate() {
        out.push_str(&format!("\nGroup {}\n", group_tag(index)));
        for id in group {
            out.push_str(&format!("@{}\n", names.get(id)));
        }
    }
    out
}

pub fn playoff_draw_announcement(pairs: &[(String, String)], names: &Names) -> String {
    let mut out = String::from("Playoff draw\n\n");
    for (num, (a, b)) in pairs.iter().enumerate() {
        out.push_str(&format!("{}. @{} - @{}\n", num + 1, names.get(a), names.get(b)));
    }
    out.push_str("\nGood luck!");
    out
}

pub fn fixture_line(fixture: &Fixture, names: &Names) -> String {
    let a = names.slot(fixture.id0.as_deref());
    let b = names.slot(fixture.id1.as_deref());
    match fixture.score {
        Some(score) => format!("{a} {}:{} {b}", score.g0, score.g1),
        None => format!("{a} - {b}"),
    }
}

/// Fixed-width table: position, handle, games, points, goal difference.
pub fn render_table(
    tag: char,
    items: &[Item],
    fixtures: &[&Fixture],
    names: &Names,
    with_results: bool,
) -> String {
    let mut out = format!("Group {tag}    [games,points,goals]\n");
    out.push_str(&"-".repeat(27));
    out.push('\n');
    for (num, item) in items.iter().enumerate() {
        let name: String = names.get(&item.id).chars().take(16).collect();
        out.push_str(&format!(
            "{} {:16}{:2}{:3}{:+4}\n",
            num + 1,
            name,
            item.games,
            item.points,
            item.goal_difference()
        ));
    }
    if with_results {
        out.push('\n');
        let lines: Vec<String> = fixtures.iter().map(|f| fixture_line(f, names)).collect();
        out.push_str(&lines.join("\n"));
    }
    out
}

pub fn round_title(round: Round) -> String {
    match round {
        Round::ThirdPlace => "Third place match".to_string(),
        Round::Knockout { depth: 0 } => "Final".to_string(),
        Round::Knockout { depth: 1 } => "Semi-finals".to_string(),
        Round::Knockout { depth: 2 } => "Quarter-finals".to_string(),
        Round::Knockout { depth } => format!("1/{} final", 1u64 << depth),
    }
}

/// Every round in bracket order with each leg and, for fully played slots,
/// the aggregate.
pub fn playoff_schedule(records: &[Record], names: &Names) -> String {
    let mut sections: Vec<String> = Vec::new();
    let mut current: Option<Round> = None;
    let mut section = String::new();

    for round_slot in bracket_slots(records) {
        let ((_, slot), round) = round_slot;
        if current != Some(round) {
            if let Some(done) = current {
                sections.push(format!("{}\n\n{}", round_title(done), section.trim_end()));
            }
            current = Some(round);
            section.clear();
        }
        for record in records {
            if let Record::Playoff(m) = record
                && m.round == round
                && m.slot == slot
            {
                section.push_str(&fixture_line(&m.fixture, names));
                section.push('\n');
            }
        }
        let agg = aggregate(records, round, slot);
        if agg.is_complete() && agg.legs > 1 {
            section.push_str(&format!(
                "  aggregate {} {}:{} {}\n",
                names.slot(agg.id0.as_deref()),
                agg.goals0,
                agg.goals1,
                names.slot(agg.id1.as_deref())
            ));
        }
    }
    if let Some(done) = current {
        sections.push(format!("{}\n\n{}", round_title(done), section.trim_end()));
    }
    sections.join("\n\n")
}

pub fn podium_text(podium: &Podium, names: &Names) -> String {
    let mut out = String::from("Tournament results\n\n");
    out.push_str(&format!("Gold: @{}\n", names.get(&podium.gold)));
    out.push_str(&format!("Silver: @{}\n", names.get(&podium.silver)));
    if let Some(bronze) = podium.bronze.as_deref() {
        out.push_str(&format!("Bronze: @{}\n", names.get(bronze)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Score;

    #[test]
    fn fixture_line_marks_empty_slots() {
        let names = Names::new(HashMap::from([("1".to_string(), "alice".to_string())]));
        let mut fixture = Fixture::placeholder();
        fixture.fill_empty_side("1");
        assert_eq!(fixture_line(&fixture, &names), "alice - ?");
        fixture.fill_empty_side("2");
        fixture.score = Some(Score::new(2, 0));
        assert_eq!(fixture_line(&fixture, &names), "alice 2:0 2");
    }

    #[test]
    fn table_rows_are_fixed_width() {
        let names = Names::default();
        let mut item = Item::new("bob");
        item.games = 2;
        item.points = 4;
        item.scored = 3;
        item.conceded = 1;
        let text = render_table('A', &[item], &[], &names, false);
        assert!(text.contains("1 bob              2  4  +2"));
    }
}

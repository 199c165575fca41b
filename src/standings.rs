use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::record::{Fixture, Record};

/// One participant's row in a group table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub games: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub scored: u32,
    pub conceded: u32,
    pub points: u32,
}

impl Item {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn goal_difference(&self) -> i64 {
        i64::from(self.scored) - i64::from(self.conceded)
    }

    fn update(&mut self, my_goals: u32, their_goals: u32) {
        self.games += 1;
        self.scored = self.scored.saturating_add(my_goals);
        self.conceded = self.conceded.saturating_add(their_goals);
        match my_goals.cmp(&their_goals) {
            Ordering::Greater => {
                self.wins += 1;
                self.points += 3;
            }
            Ordering::Equal => {
                self.draws += 1;
                self.points += 1;
            }
            Ordering::Less => self.losses += 1,
        }
    }
}

/// Descending by points, then goal difference, then goals scored.
pub fn rank_cmp(a: &Item, b: &Item) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.goal_difference().cmp(&a.goal_difference()))
        .then_with(|| b.scored.cmp(&a.scored))
}

/// Builds the ordered table of one group. Unplayed fixtures still list their
/// participants; the sort is stable so full ties keep encounter order.
pub fn compute_table<'a, I>(fixtures: I) -> Vec<Item>
where
    I: IntoIterator<Item = &'a Fixture>,
{
    let mut order: Vec<String> = Vec::new();
    let mut items: HashMap<String, Item> = HashMap::new();

    for fixture in fixtures {
        let (Some(id0), Some(id1)) = (fixture.id0.as_deref(), fixture.id1.as_deref()) else {
            continue;
        };
        for id in [id0, id1] {
            if !items.contains_key(id) {
                order.push(id.to_string());
                items.insert(id.to_string(), Item::new(id));
            }
        }
        let Some(score) = fixture.score else {
            continue;
        };
        if let Some(item) = items.get_mut(id0) {
            item.update(score.g0, score.g1);
        }
        if let Some(item) = items.get_mut(id1) {
            item.update(score.g1, score.g0);
        }
    }

    let mut table: Vec<Item> = order
        .into_iter()
        .filter_map(|id| items.remove(&id))
        .collect();
    table.sort_by(rank_cmp);
    table
}

/// Group fixtures by tag, in tag order.
pub fn group_fixtures(records: &[Record]) -> BTreeMap<char, Vec<&Fixture>> {
    let mut groups: BTreeMap<char, Vec<&Fixture>> = BTreeMap::new();
    for record in records {
        if let Record::Group(m) = record {
            groups.entry(m.group).or_default().push(&m.fixture);
        }
    }
    groups
}

pub fn group_tables(records: &[Record]) -> BTreeMap<char, Vec<Item>> {
    group_fixtures(records)
        .into_iter()
        .map(|(tag, fixtures)| (tag, compute_table(fixtures)))
        .collect()
}

/// Flattens all group tables into one ranking: every group's winner first
/// (ranked among themselves), then every runner-up, and so on.
pub fn ranked_field(tables: &BTreeMap<char, Vec<Item>>) -> Vec<Item> {
    let deepest = tables.values().map(Vec::len).max().unwrap_or(0);
    let mut field = Vec::new();
    for place in 0..deepest {
        let mut tier: Vec<Item> = tables
            .values()
            .filter_map(|table| table.get(place).cloned())
            .collect();
        tier.sort_by(rank_cmp);
        field.extend(tier);
    }
    field
}

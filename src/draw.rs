use std::collections::HashMap;

use rand::Rng;

use crate::record::{Fixture, GroupMatch, Record};

pub const DEFAULT_GROUP_LEGS: usize = 2;

/// Letter tag of the i-th group (`A`, `B`, ...).
pub fn group_tag(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

fn draw_one_and_remove<R: Rng + ?Sized>(pool: &mut Vec<String>, rng: &mut R) -> String {
    let idx = rng.gen_range(0..pool.len());
    pool.swap_remove(idx)
}

/// Splits a seed-ordered list into `group_count` groups. The list is cut into
/// pots of `group_count` members and each pot is spread over the groups in
/// random order, so no group receives two members of the same pot.
pub fn draw_groups<R: Rng + ?Sized>(
    ids_by_seed: &[String],
    group_count: usize,
    rng: &mut R,
) -> Vec<Vec<String>> {
    if group_count == 0 {
        return Vec::new();
    }
    let mut groups = vec![Vec::new(); group_count];
    for pot in ids_by_seed.chunks(group_count) {
        let mut pot = pot.to_vec();
        let mut i = 0usize;
        while !pot.is_empty() {
            groups[i % group_count].push(draw_one_and_remove(&mut pot, rng));
            i += 1;
        }
    }
    groups
}

/// Round-robin schedule: `legs` unplayed records for every pair in a group.
pub fn group_schedule(groups: &[Vec<String>], legs: usize) -> Vec<Record> {
    let mut records = Vec::new();
    for (index, members) in groups.iter().enumerate() {
        let tag = group_tag(index);
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                for _ in 0..legs {
                    records.push(Record::Group(GroupMatch {
                        group: tag,
                        fixture: Fixture::scheduled(&members[i], &members[j]),
                    }));
                }
            }
        }
    }
    records
}

/// Pairs every seeded id with an unseeded one. `seeded[i]` and `unseeded[i]`
/// must not meet in the first round if it can be avoided; the returned order
/// is the first-round slot order.
///
/// The final corrective swap is not re-checked against the blockers, so in
/// rare draws a blocked pairing can survive.
pub fn draw_playoff<R: Rng + ?Sized>(
    seeded: &[String],
    unseeded: &[String],
    rng: &mut R,
) -> Vec<(String, String)> {
    let blockers: HashMap<&str, &str> = seeded
        .iter()
        .zip(unseeded.iter())
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    let is_blocked = |a: &str, b: &str| blockers.get(a).is_some_and(|blocked| *blocked == b);

    let mut pool_a = seeded.to_vec();
    let mut pool_b = unseeded.to_vec();
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(seeded.len());

    while !pool_a.is_empty() && !pool_b.is_empty() {
        let a = draw_one_and_remove(&mut pool_a, rng);
        let mut b = draw_one_and_remove(&mut pool_b, rng);
        if is_blocked(&a, &b) && !pool_b.is_empty() {
            let redrawn = draw_one_and_remove(&mut pool_b, rng);
            pool_b.push(std::mem::replace(&mut b, redrawn));
        }
        pairs.push((a, b));
    }

    let n = pairs.len();
    if n > 1 && is_blocked(&pairs[n - 1].0, &pairs[n - 1].1) {
        let last = std::mem::take(&mut pairs[n - 1].1);
        let prev = std::mem::replace(&mut pairs[n - 2].1, last);
        pairs[n - 1].1 = prev;
    }
    pairs
}

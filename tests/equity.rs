#![forbid(unsafe_code)]
use chrono::{NaiveDate, TimeZone, Utc};
use garde::equity::{week_number, EquityConfig, EquityDistributor};
use garde::model::{OffSlot, StaffId, StaffMember};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn member(id: &str, score: f64) -> StaffMember {
    let mut m = StaffMember::with_id(id, id.to_uppercase(), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    m.fatigue.score = score;
    m
}

fn slot(id: &str, day: NaiveDate) -> OffSlot {
    OffSlot {
        id: id.into(),
        date: day,
        kind: "FULL_DAY".into(),
        is_weekend: false,
        is_holiday: false,
    }
}

fn ids(slots: &[OffSlot]) -> Vec<&str> {
    slots.iter().map(|s| s.id.as_str()).collect()
}

fn distributor(min: u32, max: u32) -> EquityDistributor {
    EquityDistributor::new(EquityConfig {
        min_off_per_week: min,
        max_off_per_week: max,
    })
}

#[test]
fn week_numbers_start_on_sunday() {
    assert_eq!(week_number(date(2025, 1, 1)), 1);
    assert_eq!(week_number(date(2025, 1, 4)), 1);
    assert_eq!(week_number(date(2025, 1, 5)), 2);
    assert_eq!(week_number(date(2024, 1, 1)), 1);
    assert_eq!(week_number(date(2024, 1, 7)), 2);
}

#[test]
fn no_slots_gives_empty_entries() {
    let staff = vec![member("a", 10.0), member("b", 0.0)];
    let distribution = EquityDistributor::default().distribute(&staff, &[]);
    assert_eq!(distribution.len(), 2);
    assert!(distribution.values().all(Vec::is_empty));

    assert!(EquityDistributor::default()
        .distribute(&[], &[slot("s1", date(2025, 3, 3))])
        .is_empty());
}

#[test]
fn most_fatigued_served_first_for_weekly_minimum() {
    let staff = vec![member("a", 10.0), member("b", 50.0)];
    let slots = vec![
        slot("s1", date(2025, 3, 3)),
        slot("s2", date(2025, 3, 4)),
        slot("s3", date(2025, 3, 5)),
    ];
    let d = distributor(1, 2).distribute(&staff, &slots);
    assert_eq!(ids(&d[&StaffId::new("b")]), ["s1", "s3"]);
    assert_eq!(ids(&d[&StaffId::new("a")]), ["s2"]);
}

#[test]
fn equal_fatigue_keeps_input_order() {
    let staff = vec![member("a", 20.0), member("b", 20.0)];
    let slots = vec![slot("s1", date(2025, 3, 3)), slot("s2", date(2025, 3, 4))];
    let d = distributor(1, 2).distribute(&staff, &slots);
    assert_eq!(ids(&d[&StaffId::new("a")]), ["s1"]);
    assert_eq!(ids(&d[&StaffId::new("b")]), ["s2"]);
}

#[test]
fn minimum_is_guaranteed_each_week() {
    let staff = vec![member("a", 50.0), member("b", 10.0)];
    // 2025-03-09 est un dimanche : nouvelle semaine
    let slots = vec![
        slot("w1a", date(2025, 3, 3)),
        slot("w1b", date(2025, 3, 4)),
        slot("w2a", date(2025, 3, 9)),
        slot("w2b", date(2025, 3, 10)),
    ];
    let d = distributor(1, 2).distribute(&staff, &slots);
    assert_eq!(ids(&d[&StaffId::new("a")]), ["w1a", "w2a"]);
    assert_eq!(ids(&d[&StaffId::new("b")]), ["w1b", "w2b"]);
}

#[test]
fn both_members_reach_weekly_minimum_of_two() {
    let staff = vec![member("a", 5.0), member("b", 5.0)];
    let slots: Vec<OffSlot> = (3..=7)
        .map(|i| slot(&format!("s{i}"), date(2025, 3, i)))
        .collect();
    let d = distributor(2, 2).distribute(&staff, &slots);
    assert_eq!(ids(&d[&StaffId::new("a")])[..2], ["s3", "s4"]);
    assert_eq!(ids(&d[&StaffId::new("b")])[..2], ["s5", "s6"]);
    // le reste va au premier à score égal
    assert_eq!(d[&StaffId::new("a")].len(), 3);
}

#[test]
fn remainder_decays_score_after_each_slot() {
    let staff = vec![member("a", 100.0), member("b", 96.0)];
    let slots = vec![
        slot("s1", date(2025, 3, 3)),
        slot("s2", date(2025, 3, 4)),
        slot("s3", date(2025, 3, 5)),
    ];
    let d = distributor(0, 2).distribute(&staff, &slots);
    // 100 -> 95 < 96, puis 96 -> 91.2 < 95
    assert_eq!(ids(&d[&StaffId::new("a")]), ["s1", "s3"]);
    assert_eq!(ids(&d[&StaffId::new("b")]), ["s2"]);
}

#[test]
fn remainder_is_taken_in_input_order() {
    let staff = vec![member("a", 30.0)];
    let slots = vec![
        slot("late", date(2025, 3, 20)),
        slot("early", date(2025, 3, 3)),
    ];
    let d = distributor(0, 2).distribute(&staff, &slots);
    assert_eq!(ids(&d[&StaffId::new("a")]), ["late", "early"]);
}

#[test]
fn quota_caps_allocation_and_leaves_surplus() {
    let staff = vec![member("a", 0.0), member("b", 0.0)];
    let slots: Vec<OffSlot> = (1..=10)
        .map(|i| slot(&format!("s{i}"), date(2025, 3, i)))
        .collect();
    let d = distributor(0, 1).distribute(&staff, &slots);
    let a = &d[&StaffId::new("a")];
    let b = &d[&StaffId::new("b")];
    assert_eq!(a.len(), 4);
    assert_eq!(b.len(), 4);
    assert_eq!(ids(a), ["s1", "s2", "s3", "s4"]);
    assert_eq!(ids(b), ["s5", "s6", "s7", "s8"]);
}

#[test]
fn every_slot_allocated_at_most_once() {
    let staff = vec![member("a", 70.0), member("b", 40.0), member("c", 10.0)];
    let slots: Vec<OffSlot> = (1..=14)
        .map(|i| slot(&format!("s{i}"), date(2025, 3, i)))
        .collect();
    let d = distributor(1, 2).distribute(&staff, &slots);
    let mut all: Vec<&str> = d.values().flat_map(|v| ids(v)).collect();
    let total = all.len();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total);
    assert_eq!(total, 14);
    assert!(d.values().all(|v| v.len() <= 8));
}

#[test]
fn weeks_are_grouped_by_number_across_years() {
    let staff = vec![member("a", 50.0), member("b", 10.0)];
    // deux semaines 1 d'années différentes : un seul pool
    let slots = vec![slot("y24", date(2024, 1, 2)), slot("y25", date(2025, 1, 2))];
    let d = distributor(1, 2).distribute(&staff, &slots);
    assert_eq!(ids(&d[&StaffId::new("a")]), ["y24"]);
    assert_eq!(ids(&d[&StaffId::new("b")]), ["y25"]);
}

#[test]
fn huge_weekly_maximum_saturates_quota() {
    let config = EquityConfig {
        min_off_per_week: 0,
        max_off_per_week: u32::MAX,
    };
    assert_eq!(config.quota(), u32::MAX as usize);
    assert_eq!(EquityConfig::default().quota(), 8);

    let d = EquityDistributor::new(config).distribute(&[member("a", 0.0)], &[slot("s1", date(2025, 3, 3))]);
    assert_eq!(ids(&d[&StaffId::new("a")]), ["s1"]);
}

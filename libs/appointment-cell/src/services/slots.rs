use chrono::NaiveTime;

use crate::models::Slot;

/// Every bookable window spans 50 minutes, leaving a 10-minute gap before
/// the next one starts on the hour.
pub const SLOT_MINUTES: u32 = 50;

const MORNING_HOURS: std::ops::Range<u32> = 10..13;
const AFTERNOON_HOURS: std::ops::Range<u32> = 14..19;
const LUNCH_START_HOUR: u32 = 13;

fn slot_at(hour: u32, minutes: u32, lunch_break: bool) -> Slot {
    let start = NaiveTime::from_hms_opt(hour, 0, 0).unwrap();
    let end = NaiveTime::from_hms_opt(hour + minutes / 60, minutes % 60, 0).unwrap();
    Slot {
        label: format!("{} - {}", start.format("%I:%M %p"), end.format("%I:%M %p")),
        start,
        end,
        lunch_break,
    }
}

/// The fixed slot sequence for any clinic business day. Pure and
/// deterministic: availability is computed by diffing claims against this.
/// The lunch window is part of the sequence but never bookable.
pub fn daily_slots() -> Vec<Slot> {
    let mut slots: Vec<Slot> = MORNING_HOURS
        .map(|hour| slot_at(hour, SLOT_MINUTES, false))
        .collect();

    slots.push(slot_at(LUNCH_START_HOUR, 60, true));

    slots.extend(AFTERNOON_HOURS.map(|hour| slot_at(hour, SLOT_MINUTES, false)));
    slots
}

/// Look a label up in the generated sequence; anything else is not a slot.
pub fn find_slot(label: &str) -> Option<Slot> {
    daily_slots().into_iter().find(|slot| slot.label == label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_stable_across_calls() {
        assert_eq!(daily_slots(), daily_slots());
    }

    #[test]
    fn sequence_has_morning_lunch_and_afternoon() {
        let slots = daily_slots();
        assert_eq!(slots.len(), 9);
        assert_eq!(slots.iter().filter(|s| s.lunch_break).count(), 1);

        assert_eq!(slots[0].label, "10:00 AM - 10:50 AM");
        assert_eq!(slots[3].label, "01:00 PM - 02:00 PM");
        assert!(slots[3].lunch_break);
        assert_eq!(slots[8].label, "06:00 PM - 06:50 PM");
    }

    #[test]
    fn slots_are_ordered_and_fifty_minutes_long() {
        let slots = daily_slots();
        for window in slots.windows(2) {
            assert!(window[0].start < window[1].start);
        }
        for slot in slots.iter().filter(|s| !s.lunch_break) {
            assert_eq!((slot.end - slot.start).num_minutes(), SLOT_MINUTES as i64);
        }
    }

    #[test]
    fn labels_resolve_back_to_their_slot() {
        let slot = find_slot("10:00 AM - 10:50 AM").unwrap();
        assert_eq!(slot.start, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert!(find_slot("25:00 XM - nonsense").is_none());
    }
}

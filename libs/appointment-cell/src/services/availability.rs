use std::collections::HashSet;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc, Weekday};

use shared_config::BookingRules;

use crate::models::{DayAvailability, Slot, SlotAvailability};
use crate::services::slots::daily_slots;

/// Computes, per generated slot, whether it can still be booked on a date.
/// Works entirely on structured slot times in the clinic's local clock.
pub struct AvailabilityResolver {
    rules: BookingRules,
}

impl AvailabilityResolver {
    pub fn new(rules: BookingRules) -> Self {
        Self { rules }
    }

    fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.rules.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// The current calendar date on the clinic's wall clock.
    pub fn clinic_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.clinic_offset()).date_naive()
    }

    /// A slot's start instant on a given date, as UTC.
    pub fn slot_start(&self, date: NaiveDate, slot: &Slot) -> DateTime<Utc> {
        date.and_time(slot.start)
            .and_local_timezone(self.clinic_offset())
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Rules in precedence order: closed weekday beats everything; then
    /// claims; then the same-day cutoff; the lunch slot is never bookable.
    pub fn resolve(
        &self,
        date: NaiveDate,
        claimed: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> DayAvailability {
        if date.weekday() == Weekday::Sun {
            return DayAvailability::Closed;
        }

        let local_now = now.with_timezone(&self.clinic_offset());
        let is_today = local_now.date_naive() == date;
        let cutoff_seconds = self.rules.same_day_cutoff_minutes * 60;

        let slots = daily_slots()
            .into_iter()
            .map(|slot| {
                let mut is_booked = slot.lunch_break || claimed.contains(&slot.label);

                // Same-day bookings need a minimum lead time before the
                // slot starts; slots at or past the boundary are closed off.
                if is_today && !is_booked {
                    let seconds_to_start = (slot.start - local_now.time()).num_seconds();
                    if seconds_to_start <= cutoff_seconds {
                        is_booked = true;
                    }
                }

                SlotAvailability {
                    time: slot.label,
                    is_booked,
                }
            })
            .collect();

        DayAvailability::Open(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rules() -> BookingRules {
        BookingRules {
            max_pending_appointments: 3,
            advance_booking_days: 7,
            same_day_cutoff_minutes: 30,
            cancellation_cutoff_hours: 2,
            clinic_utc_offset_minutes: 0,
        }
    }

    fn resolver() -> AvailabilityResolver {
        AvailabilityResolver::new(rules())
    }

    fn open_slots(availability: DayAvailability) -> Vec<SlotAvailability> {
        match availability {
            DayAvailability::Open(slots) => slots,
            DayAvailability::Closed => panic!("expected an open day"),
        }
    }

    // 2026-08-05 is a Wednesday, 2026-08-09 a Sunday
    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 5, hour, minute, 0).unwrap()
    }

    #[test]
    fn sunday_is_closed_even_with_no_claims() {
        let sunday = NaiveDate::from_ymd_opt(2026, 8, 9).unwrap();
        let availability = resolver().resolve(sunday, &HashSet::new(), at(6, 0));
        assert_eq!(availability, DayAvailability::Closed);
    }

    #[test]
    fn claimed_slots_are_booked_and_others_free() {
        let claimed = HashSet::from(["10:00 AM - 10:50 AM".to_string()]);
        // A future date: no same-day restrictions apply
        let future = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let slots = open_slots(resolver().resolve(future, &claimed, at(23, 0)));

        assert!(slots[0].is_booked);
        assert!(!slots[1].is_booked);
    }

    #[test]
    fn lunch_slot_is_never_bookable() {
        let future = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let slots = open_slots(resolver().resolve(future, &HashSet::new(), at(6, 0)));
        assert!(slots[3].is_booked);
    }

    #[test]
    fn same_day_slots_inside_the_lead_window_are_closed() {
        // 09:45: the 10:00 slot starts in 15 minutes, under the 30-minute lead
        let slots = open_slots(resolver().resolve(wednesday(), &HashSet::new(), at(9, 45)));
        assert!(slots[0].is_booked);
        // 11:00 is 75 minutes out
        assert!(!slots[1].is_booked);
    }

    #[test]
    fn same_day_cutoff_boundary_is_unavailable() {
        // 10:30: the 11:00 slot starts in exactly 30 minutes
        let slots = open_slots(resolver().resolve(wednesday(), &HashSet::new(), at(10, 30)));
        assert!(slots[1].is_booked);

        // One minute earlier the same slot is still open
        let slots = open_slots(resolver().resolve(wednesday(), &HashSet::new(), at(10, 29)));
        assert!(!slots[1].is_booked);
    }

    #[test]
    fn started_slots_are_unavailable() {
        let slots = open_slots(resolver().resolve(wednesday(), &HashSet::new(), at(10, 10)));
        assert!(slots[0].is_booked);
    }

    #[test]
    fn other_days_ignore_the_clock() {
        let thursday = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let slots = open_slots(resolver().resolve(thursday, &HashSet::new(), at(23, 0)));
        assert!(slots.iter().filter(|s| !s.is_booked).count() == 8);
    }

    #[test]
    fn clinic_offset_shifts_what_today_means() {
        // +05:30: 20:00 UTC on the 4th is already the 5th locally
        let ist = AvailabilityResolver::new(BookingRules {
            clinic_utc_offset_minutes: 330,
            ..rules()
        });
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 20, 0, 0).unwrap();
        assert_eq!(ist.clinic_today(now), wednesday());
    }
}

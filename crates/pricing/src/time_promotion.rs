use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ValueObject};
use storefront_events::{Command, Event};

use crate::MAX_PERCENT;

pub const TIME_PROMOTION_CREATED: &str = "pricing.time_promotion.created";
pub const TIME_PROMOTION_LABELED: &str = "pricing.time_promotion.labeled";
pub const TIME_PROMOTION_DISCOUNT_SET: &str = "pricing.time_promotion.discount_set";
pub const TIME_PROMOTION_RANGE_SET: &str = "pricing.time_promotion.range_set";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimePromotionId(pub AggregateId);

impl TimePromotionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TimePromotionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Validity window, closed on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl ValueObject for TimeRange {}

impl TimeRange {
    pub fn new(valid_from: DateTime<Utc>, valid_until: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_until,
        }
    }

    /// `valid_from <= at <= valid_until`. An inverted window contains nothing.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at <= self.valid_until
    }
}

/// Aggregate root: a promotional campaign with a discount and a validity window.
///
/// Every field follows last-write-wins; the aggregate has no lifecycle beyond
/// existing, so all commands are accepted in any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePromotion {
    id: TimePromotionId,
    label: Option<String>,
    discount_percent: u8,
    range: Option<TimeRange>,
    version: u64,
    created: bool,
}

impl TimePromotion {
    pub const AGGREGATE_TYPE: &'static str = "pricing.time_promotion";

    pub fn empty(id: TimePromotionId) -> Self {
        Self {
            id,
            label: None,
            discount_percent: 0,
            range: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TimePromotionId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn discount_percent(&self) -> u8 {
        self.discount_percent
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    /// Whether an explicit `CreateTimePromotion` was recorded. Promotions that
    /// were only configured still take part in pricing.
    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Active only when the window is set and contains `at`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.range.is_some_and(|r| r.contains(at))
    }
}

impl AggregateRoot for TimePromotion {
    type Id = TimePromotionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTimePromotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTimePromotion {
    pub time_promotion_id: TimePromotionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LabelTimePromotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTimePromotion {
    pub time_promotion_id: TimePromotionId,
    pub label: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetTimePromotionDiscount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTimePromotionDiscount {
    pub time_promotion_id: TimePromotionId,
    pub discount: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetTimePromotionRange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTimePromotionRange {
    pub time_promotion_id: TimePromotionId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePromotionCommand {
    Create(CreateTimePromotion),
    Label(LabelTimePromotion),
    SetDiscount(SetTimePromotionDiscount),
    SetRange(SetTimePromotionRange),
}

impl TimePromotionCommand {
    pub fn time_promotion_id(&self) -> TimePromotionId {
        match self {
            TimePromotionCommand::Create(c) => c.time_promotion_id,
            TimePromotionCommand::Label(c) => c.time_promotion_id,
            TimePromotionCommand::SetDiscount(c) => c.time_promotion_id,
            TimePromotionCommand::SetRange(c) => c.time_promotion_id,
        }
    }
}

impl Command for TimePromotionCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.time_promotion_id().0
    }
}

/// Event: TimePromotionCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePromotionCreated {
    pub time_promotion_id: TimePromotionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TimePromotionLabeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePromotionLabeled {
    pub time_promotion_id: TimePromotionId,
    pub label: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TimePromotionDiscountSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePromotionDiscountSet {
    pub time_promotion_id: TimePromotionId,
    pub discount: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TimePromotionRangeSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePromotionRangeSet {
    pub time_promotion_id: TimePromotionId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePromotionEvent {
    TimePromotionCreated(TimePromotionCreated),
    TimePromotionLabeled(TimePromotionLabeled),
    TimePromotionDiscountSet(TimePromotionDiscountSet),
    TimePromotionRangeSet(TimePromotionRangeSet),
}

impl TimePromotionEvent {
    pub fn time_promotion_id(&self) -> TimePromotionId {
        match self {
            TimePromotionEvent::TimePromotionCreated(e) => e.time_promotion_id,
            TimePromotionEvent::TimePromotionLabeled(e) => e.time_promotion_id,
            TimePromotionEvent::TimePromotionDiscountSet(e) => e.time_promotion_id,
            TimePromotionEvent::TimePromotionRangeSet(e) => e.time_promotion_id,
        }
    }
}

impl Event for TimePromotionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimePromotionEvent::TimePromotionCreated(_) => TIME_PROMOTION_CREATED,
            TimePromotionEvent::TimePromotionLabeled(_) => TIME_PROMOTION_LABELED,
            TimePromotionEvent::TimePromotionDiscountSet(_) => TIME_PROMOTION_DISCOUNT_SET,
            TimePromotionEvent::TimePromotionRangeSet(_) => TIME_PROMOTION_RANGE_SET,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TimePromotionEvent::TimePromotionCreated(e) => e.occurred_at,
            TimePromotionEvent::TimePromotionLabeled(e) => e.occurred_at,
            TimePromotionEvent::TimePromotionDiscountSet(e) => e.occurred_at,
            TimePromotionEvent::TimePromotionRangeSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TimePromotion {
    type Command = TimePromotionCommand;
    type Event = TimePromotionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TimePromotionEvent::TimePromotionCreated(_) => {
                self.created = true;
            }
            TimePromotionEvent::TimePromotionLabeled(e) => {
                self.label = Some(e.label.clone());
            }
            TimePromotionEvent::TimePromotionDiscountSet(e) => {
                self.discount_percent = e.discount;
            }
            TimePromotionEvent::TimePromotionRangeSet(e) => {
                self.range = Some(TimeRange::new(e.start_time, e.end_time));
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.time_promotion_id() != self.id {
            return Err(DomainError::invariant("time_promotion_id mismatch"));
        }

        let event = match command {
            TimePromotionCommand::Create(cmd) => {
                TimePromotionEvent::TimePromotionCreated(TimePromotionCreated {
                    time_promotion_id: cmd.time_promotion_id,
                    occurred_at: cmd.occurred_at,
                })
            }
            TimePromotionCommand::Label(cmd) => {
                TimePromotionEvent::TimePromotionLabeled(TimePromotionLabeled {
                    time_promotion_id: cmd.time_promotion_id,
                    label: cmd.label.clone(),
                    occurred_at: cmd.occurred_at,
                })
            }
            TimePromotionCommand::SetDiscount(cmd) => {
                if cmd.discount > MAX_PERCENT {
                    return Err(DomainError::validation(format!(
                        "discount must be between 0 and {MAX_PERCENT}, got {}",
                        cmd.discount
                    )));
                }
                TimePromotionEvent::TimePromotionDiscountSet(TimePromotionDiscountSet {
                    time_promotion_id: cmd.time_promotion_id,
                    discount: cmd.discount,
                    occurred_at: cmd.occurred_at,
                })
            }
            TimePromotionCommand::SetRange(cmd) => {
                TimePromotionEvent::TimePromotionRangeSet(TimePromotionRangeSet {
                    time_promotion_id: cmd.time_promotion_id,
                    start_time: cmd.start_time,
                    end_time: cmd.end_time,
                    occurred_at: cmd.occurred_at,
                })
            }
        };

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use storefront_events::execute;

    fn test_promotion_id() -> TimePromotionId {
        TimePromotionId::new(AggregateId::new())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 5, 30, 15, 33, 0).unwrap()
    }

    fn set_discount(id: TimePromotionId, discount: u8) -> TimePromotionCommand {
        TimePromotionCommand::SetDiscount(SetTimePromotionDiscount {
            time_promotion_id: id,
            discount,
            occurred_at: t0(),
        })
    }

    fn set_range(
        id: TimePromotionId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> TimePromotionCommand {
        TimePromotionCommand::SetRange(SetTimePromotionRange {
            time_promotion_id: id,
            start_time,
            end_time,
            occurred_at: t0(),
        })
    }

    #[test]
    fn create_emits_time_promotion_created() {
        let id = test_promotion_id();
        let promotion = TimePromotion::empty(id);
        let events = promotion
            .handle(&TimePromotionCommand::Create(CreateTimePromotion {
                time_promotion_id: id,
                occurred_at: t0(),
            }))
            .unwrap();

        assert_eq!(
            events,
            vec![TimePromotionEvent::TimePromotionCreated(TimePromotionCreated {
                time_promotion_id: id,
                occurred_at: t0(),
            })]
        );
    }

    #[test]
    fn label_is_stored() {
        let id = test_promotion_id();
        let mut promotion = TimePromotion::empty(id);
        execute(
            &mut promotion,
            &TimePromotionCommand::Label(LabelTimePromotion {
                time_promotion_id: id,
                label: "Last Minute".to_string(),
                occurred_at: t0(),
            }),
        )
        .unwrap();
        assert_eq!(promotion.label(), Some("Last Minute"));
    }

    #[test]
    fn discount_and_range_are_last_write_wins() {
        let id = test_promotion_id();
        let mut promotion = TimePromotion::empty(id);

        execute(&mut promotion, &set_range(id, t0() - Duration::days(5), t0() - Duration::days(2))).unwrap();
        execute(&mut promotion, &set_discount(id, 30)).unwrap();
        execute(&mut promotion, &set_range(id, t0() - Duration::days(1), t0() + Duration::days(1))).unwrap();
        execute(&mut promotion, &set_discount(id, 20)).unwrap();
        execute(&mut promotion, &set_discount(id, 40)).unwrap();

        assert_eq!(promotion.discount_percent(), 40);
        assert!(promotion.is_active_at(t0()));
        assert_eq!(promotion.version(), 5);
    }

    #[test]
    fn commands_are_accepted_without_create() {
        let id = test_promotion_id();
        let mut promotion = TimePromotion::empty(id);
        execute(&mut promotion, &set_discount(id, 25)).unwrap();
        assert!(!promotion.is_created());
        assert_eq!(promotion.discount_percent(), 25);
    }

    #[test]
    fn discount_above_hundred_is_rejected() {
        let id = test_promotion_id();
        let promotion = TimePromotion::empty(id);
        let err = promotion.handle(&set_discount(id, 101)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn promotion_without_range_is_never_active() {
        let id = test_promotion_id();
        let mut promotion = TimePromotion::empty(id);
        execute(&mut promotion, &set_discount(id, 50)).unwrap();
        assert!(!promotion.is_active_at(t0()));
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let start = t0();
        let end = t0() + Duration::days(1);
        let range = TimeRange::new(start, end);

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(start - Duration::milliseconds(1)));
        assert!(!range.contains(end + Duration::milliseconds(1)));
    }

    #[test]
    fn inverted_window_contains_nothing() {
        let range = TimeRange::new(t0(), t0() - Duration::days(1));
        assert!(!range.contains(t0()));
        assert!(!range.contains(t0() - Duration::hours(12)));
    }

    #[test]
    fn apply_is_deterministic() {
        let id = test_promotion_id();
        let events = vec![
            TimePromotionEvent::TimePromotionCreated(TimePromotionCreated {
                time_promotion_id: id,
                occurred_at: t0(),
            }),
            TimePromotionEvent::TimePromotionDiscountSet(TimePromotionDiscountSet {
                time_promotion_id: id,
                discount: 15,
                occurred_at: t0(),
            }),
        ];

        let mut first = TimePromotion::empty(id);
        first.replay(&events);
        let mut second = TimePromotion::empty(id);
        second.replay(&events);

        assert_eq!(first, second);
        assert_eq!(first.discount_percent(), 15);
    }
}

//! Projection runner: replays envelopes in chain order and tracks progress.

use crate::{EventEnvelope, LogPosition, Projection};

/// Runs envelopes through a projection, skipping positions already applied.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursor: Option<LogPosition>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursor: None,
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Last applied chain position (if any envelopes were applied).
    pub fn cursor(&self) -> Option<LogPosition> {
        self.cursor
    }

    /// Apply a single envelope.
    ///
    /// Returns `false` when the envelope sits at or before the cursor, i.e. it was
    /// redelivered by an overlapping rescan.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> bool {
        let position = envelope.position();
        if matches!(self.cursor, Some(last) if position <= last) {
            return false;
        }

        self.projection.apply(envelope);
        self.cursor = Some(position);
        true
    }

    /// Apply many envelopes; they are sorted into chain order first.
    ///
    /// Returns the number of envelopes actually applied.
    pub fn run<'a>(&mut self, envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>) -> usize
    where
        P::Ev: 'a,
    {
        let mut ordered: Vec<_> = envelopes.into_iter().collect();
        ordered.sort_by_key(|e| e.position());

        ordered.into_iter().filter(|env| self.apply(env)).count()
    }

    /// Rebuild a projection from scratch by replaying the full event history.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> (P, Option<LogPosition>)
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes);
        (runner.projection, runner.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone)]
    struct Deposited(u64);

    impl Event for Deposited {
        fn event_type(&self) -> &'static str {
            "test.deposited"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            DateTime::<Utc>::UNIX_EPOCH
        }
    }

    #[derive(Debug, Default)]
    struct Total(u64);

    impl Projection for Total {
        type Ev = Deposited;

        fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
            self.0 += envelope.payload().0;
        }
    }

    fn env(block: u64, idx: u32, amount: u64) -> EventEnvelope<Deposited> {
        EventEnvelope::new(format!("0x{block}{idx}"), LogPosition::new(block, idx), "Deposited", Deposited(amount))
    }

    #[test]
    fn overlapping_rescan_does_not_double_count() {
        let first = vec![env(1, 0, 10), env(2, 0, 20)];
        let rescan = vec![env(1, 0, 10), env(2, 0, 20), env(3, 1, 5)];

        let mut runner = ProjectionRunner::new(Total::default());
        assert_eq!(runner.run(&first), 2);
        assert_eq!(runner.run(&rescan), 1);
        assert_eq!(runner.projection().0, 35);
        assert_eq!(runner.cursor(), Some(LogPosition::new(3, 1)));
    }

    #[test]
    fn rebuild_sorts_into_chain_order() {
        let logs = vec![env(5, 0, 1), env(2, 3, 2), env(2, 1, 4)];
        let (total, cursor) = ProjectionRunner::rebuild_from_scratch(Total::default, &logs);
        assert_eq!(total.0, 7);
        assert_eq!(cursor, Some(LogPosition::new(5, 0)));
    }
}

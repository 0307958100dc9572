use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{BoxError, ConsensusError};
use crate::parameters::Parameters;

/// Pause before re-sampling after an under-sized sample, so a shrunken
/// peer set does not peg the task in a hot retry loop.
const RESAMPLE_DELAY: Duration = Duration::from_millis(25);

/// How a finished engine run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Confidence reached beta; the last committed value is final.
    Finalized {
        /// Number of round-loop iterations taken, under-sized samples included.
        rounds: usize,
    },
    /// The cancellation token fired before the value finalized.
    Cancelled,
}

/// Per-block consensus engine.
///
/// An engine is created fresh for each block index, seeded with the block's
/// current value, run to completion once, and then discarded. It never
/// touches the network itself; sampling and persistence are injected as
/// callbacks by the orchestrator.
#[derive(Debug)]
pub struct Engine {
    parameters: Parameters,
    preference: Vec<u8>,
    confidence: usize,
    running: bool,
}

impl Engine {
    pub fn new(parameters: Parameters, preference: Vec<u8>) -> Result<Self, ConsensusError> {
        parameters.verify()?;
        Ok(Engine {
            parameters,
            preference,
            confidence: 0,
            running: false,
        })
    }

    /// The engine's current best candidate value.
    pub fn preference(&self) -> &[u8] {
        &self.preference
    }

    /// Run the round loop until the preference is final.
    ///
    /// Each round asks `sample` for up to `k` peer preferences, tallies
    /// them, and either reinforces or resets confidence:
    ///
    /// - fewer than `k` responses: not an error, retry the round after a
    ///   short delay;
    /// - the most frequent value reaches `alpha`: adopt it, persist it via
    ///   `commit`, then bump confidence if the preference was unchanged or
    ///   restart accumulation at 1 if it flipped;
    /// - no value reaches `alpha`: reset confidence to 0.
    ///
    /// The loop ends when confidence reaches `beta`. Cancellation is
    /// checked at the top of every round and reported as a distinct
    /// [`SyncOutcome::Cancelled`], not as success or failure. Sample and
    /// commit failures abort the run with the cause wrapped.
    pub async fn sync<S, SFut, C, CFut>(
        &mut self,
        cancel: &CancellationToken,
        mut sample: S,
        mut commit: C,
    ) -> Result<SyncOutcome, ConsensusError>
    where
        S: FnMut(usize) -> SFut,
        SFut: Future<Output = Result<Vec<Vec<u8>>, BoxError>>,
        C: FnMut(Vec<u8>) -> CFut,
        CFut: Future<Output = Result<(), BoxError>>,
    {
        if self.running {
            return Err(ConsensusError::AlreadyRunning);
        }
        self.running = true;
        self.confidence = 1;

        let mut rounds = 0;
        while self.confidence < self.parameters.beta {
            if cancel.is_cancelled() {
                debug!(rounds, "consensus cancelled");
                self.running = false;
                return Ok(SyncOutcome::Cancelled);
            }
            rounds += 1;

            let preferences = sample(self.parameters.k)
                .await
                .map_err(ConsensusError::Sample)?;
            if preferences.len() < self.parameters.k {
                trace!(
                    got = preferences.len(),
                    want = self.parameters.k,
                    "under-sized sample, retrying"
                );
                tokio::time::sleep(RESAMPLE_DELAY).await;
                continue;
            }

            let (frequent, majority) = most_frequent(&preferences)?;
            if frequent >= self.parameters.alpha {
                let majority = majority.to_vec();
                let old_preference = std::mem::replace(&mut self.preference, majority);
                commit(self.preference.clone())
                    .await
                    .map_err(ConsensusError::Commit)?;

                if self.preference == old_preference {
                    self.confidence += 1;
                } else {
                    self.confidence = 1;
                }
            } else {
                self.confidence = 0;
            }
        }

        debug!(rounds, confidence = self.confidence, "preference finalized");
        self.running = false;
        Ok(SyncOutcome::Finalized { rounds })
    }
}

/// Tally a sample and return `(count, value)` for its most frequent entry.
///
/// The scan keeps the first value whose occurrence count strictly exceeds
/// the running maximum, so among equally frequent values the one appearing
/// earliest in the sample wins and later ties never displace it.
fn most_frequent(preferences: &[Vec<u8>]) -> Result<(usize, &[u8]), ConsensusError> {
    if preferences.is_empty() {
        return Err(ConsensusError::EmptySample);
    }

    let mut best_count = 0;
    let mut best: &[u8] = &[];
    for candidate in preferences {
        let count = preferences.iter().filter(|other| *other == candidate).count();
        if count > best_count {
            best_count = count;
            best = candidate;
        }
    }
    Ok((best_count, best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    fn params(k: usize, alpha: usize, beta: usize) -> Parameters {
        Parameters { k, alpha, beta }
    }

    #[test]
    fn rejects_invalid_parameters_at_construction() {
        let err = Engine::new(params(4, 2, 1), vec![0x01]).unwrap_err();
        assert!(matches!(err, ConsensusError::Parameters(_)));
    }

    #[test]
    fn most_frequent_counts_exact_matches() {
        let sample = vec![vec![0x01], vec![0x02], vec![0x01]];
        let (count, value) = most_frequent(&sample).unwrap();
        assert_eq!(count, 2);
        assert_eq!(value, [0x01]);
    }

    #[test]
    fn most_frequent_tie_keeps_earliest_value() {
        let sample = vec![vec![0x02], vec![0x01], vec![0x02], vec![0x01]];
        let (count, value) = most_frequent(&sample).unwrap();
        assert_eq!(count, 2);
        assert_eq!(value, [0x02]);

        // A later value with an equal count never displaces the leader.
        let sample = vec![vec![0x09], vec![0x07], vec![0x07], vec![0x09]];
        let (count, value) = most_frequent(&sample).unwrap();
        assert_eq!(count, 2);
        assert_eq!(value, [0x09]);
    }

    #[test]
    fn most_frequent_rejects_empty_sample() {
        let err = most_frequent(&[]).unwrap_err();
        assert!(matches!(err, ConsensusError::EmptySample));
    }

    #[tokio::test]
    async fn two_agreeing_peers_finalize_the_seeded_value() {
        // k=2, alpha=2, beta=2, both peers always report the value the
        // engine already holds. Confidence starts at 1, so a single
        // reinforcing sample reaches beta.
        let mut engine = Engine::new(params(2, 2, 2), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        let sample_calls = Cell::new(0usize);
        let commits = RefCell::new(Vec::new());

        let outcome = engine
            .sync(
                &cancel,
                |k| {
                    sample_calls.set(sample_calls.get() + 1);
                    async move { Ok::<_, BoxError>(vec![vec![0x01]; k]) }
                },
                |value| {
                    commits.borrow_mut().push(value);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Finalized { rounds: 1 });
        assert_eq!(sample_calls.get(), 1);
        assert_eq!(*commits.borrow(), vec![vec![0x01]]);
        assert_eq!(engine.preference(), [0x01]);
        assert_eq!(engine.confidence, 2);
    }

    #[tokio::test]
    async fn reinforcing_rounds_accumulate_until_beta() {
        // beta=4 from a starting confidence of 1 takes three reinforcing
        // samples, each of which re-commits the held value.
        let mut engine = Engine::new(params(2, 2, 4), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        let commits = RefCell::new(Vec::new());

        let outcome = engine
            .sync(
                &cancel,
                |k| async move { Ok::<_, BoxError>(vec![vec![0x01]; k]) },
                |value| {
                    commits.borrow_mut().push(value);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Finalized { rounds: 3 });
        assert_eq!(*commits.borrow(), vec![vec![0x01]; 3]);
        assert_eq!(engine.confidence, 4);
    }

    #[tokio::test]
    async fn adopting_a_new_value_restarts_confidence_at_one() {
        // The engine starts on 0x01 but the network unanimously holds 0x02:
        // round 1 flips the preference (confidence restarts at 1), and only
        // then do rounds reinforce it, so beta=3 takes 3 rounds in total.
        let mut engine = Engine::new(params(2, 2, 3), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        let commits = RefCell::new(Vec::new());

        let outcome = engine
            .sync(
                &cancel,
                |k| async move { Ok::<_, BoxError>(vec![vec![0x02]; k]) },
                |value| {
                    commits.borrow_mut().push(value);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Finalized { rounds: 3 });
        assert_eq!(
            *commits.borrow(),
            vec![vec![0x02], vec![0x02], vec![0x02]]
        );
        assert_eq!(engine.preference(), [0x02]);
    }

    #[tokio::test]
    async fn no_quorum_resets_confidence_to_zero() {
        // Round scripts: two reinforcing rounds build confidence to 2, a
        // splintered sample wipes it to 0, and the engine then needs three
        // more reinforcing rounds to reach beta=3.
        let mut engine = Engine::new(params(3, 2, 3), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        let script: RefCell<VecDeque<Vec<Vec<u8>>>> = RefCell::new(VecDeque::from(vec![
            vec![vec![0x01], vec![0x01], vec![0x02]],
            vec![vec![0x01], vec![0x02], vec![0x03]],
            vec![vec![0x01], vec![0x01], vec![0x01]],
            vec![vec![0x01], vec![0x01], vec![0x02]],
            vec![vec![0x01], vec![0x01], vec![0x01]],
        ]));
        let commits = Cell::new(0usize);

        let outcome = engine
            .sync(
                &cancel,
                |_k| {
                    let next = script.borrow_mut().pop_front().expect("script exhausted");
                    async move { Ok::<_, BoxError>(next) }
                },
                |_value| {
                    commits.set(commits.get() + 1);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        // Round 1 confirms (confidence 2), round 2 has no quorum and wipes
        // confidence to 0, rounds 3-5 rebuild it 1 -> 2 -> 3.
        assert_eq!(outcome, SyncOutcome::Finalized { rounds: 5 });
        assert_eq!(commits.get(), 4);
        assert_eq!(engine.preference(), [0x01]);
    }

    #[tokio::test]
    async fn committed_value_equals_last_selected_majority() {
        // The network flips from 0x05 to 0x06 mid-run; whatever the engine
        // finalizes must be the last majority it committed.
        let mut engine = Engine::new(params(2, 2, 3), vec![0x05]).unwrap();
        let cancel = CancellationToken::new();
        let script: RefCell<VecDeque<Vec<Vec<u8>>>> = RefCell::new(VecDeque::from(vec![
            vec![vec![0x05], vec![0x05]],
            vec![vec![0x06], vec![0x06]],
            vec![vec![0x06], vec![0x06]],
            vec![vec![0x06], vec![0x06]],
        ]));
        let commits = RefCell::new(Vec::new());

        let outcome = engine
            .sync(
                &cancel,
                |_k| {
                    let next = script.borrow_mut().pop_front().expect("script exhausted");
                    async move { Ok::<_, BoxError>(next) }
                },
                |value| {
                    commits.borrow_mut().push(value);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Finalized { rounds: 4 });
        assert_eq!(commits.borrow().last().unwrap(), &vec![0x06]);
        assert_eq!(engine.preference(), [0x06]);
    }

    #[tokio::test]
    async fn beta_of_one_finalizes_without_sampling() {
        // Confidence starts at 1, so beta=1 is satisfied before the first
        // round ever runs.
        let mut engine = Engine::new(params(3, 2, 1), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        let sample_calls = Cell::new(0usize);

        let outcome = engine
            .sync(
                &cancel,
                |_k| {
                    sample_calls.set(sample_calls.get() + 1);
                    async { Ok::<_, BoxError>(vec![]) }
                },
                |_value| async { Ok::<(), BoxError>(()) },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Finalized { rounds: 0 });
        assert_eq!(sample_calls.get(), 0);
        assert_eq!(engine.preference(), [0x01]);
    }

    #[tokio::test(start_paused = true)]
    async fn splintered_samples_never_reach_quorum() {
        // Three distinct values every round: the most frequent count is 1,
        // below alpha=2, so confidence is wiped each round and the loop
        // would run forever. The test bounds it with cancellation.
        let mut engine = Engine::new(params(3, 2, 2), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        let sample_calls = Cell::new(0usize);
        let commits = Cell::new(0usize);

        let outcome = engine
            .sync(
                &cancel,
                |_k| {
                    sample_calls.set(sample_calls.get() + 1);
                    if sample_calls.get() >= 8 {
                        cancel.cancel();
                    }
                    async { Ok::<_, BoxError>(vec![vec![0x01], vec![0x02], vec![0x03]]) }
                },
                |_value| {
                    commits.set(commits.get() + 1);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Cancelled);
        assert_eq!(sample_calls.get(), 8);
        assert_eq!(commits.get(), 0);
        assert_eq!(engine.confidence, 0);
        assert_eq!(engine.preference(), [0x01]);
    }

    #[tokio::test(start_paused = true)]
    async fn under_sized_samples_only_retry_the_round() {
        // Every sample returns one value against k=2: the round is retried
        // without touching confidence or committing anything.
        let mut engine = Engine::new(params(2, 2, 2), vec![0x09]).unwrap();
        let cancel = CancellationToken::new();
        let sample_calls = Cell::new(0usize);
        let commits = Cell::new(0usize);

        let outcome = engine
            .sync(
                &cancel,
                |_k| {
                    sample_calls.set(sample_calls.get() + 1);
                    if sample_calls.get() >= 5 {
                        cancel.cancel();
                    }
                    async { Ok::<_, BoxError>(vec![vec![0x09]]) }
                },
                |_value| {
                    commits.set(commits.get() + 1);
                    async { Ok::<(), BoxError>(()) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Cancelled);
        assert_eq!(sample_calls.get(), 5);
        assert_eq!(commits.get(), 0);
        assert_eq!(engine.confidence, 1);
        assert_eq!(engine.preference(), [0x09]);
    }

    #[tokio::test]
    async fn sample_failure_aborts_the_run() {
        let mut engine = Engine::new(params(2, 2, 2), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();

        let err = engine
            .sync(
                &cancel,
                |_k| async { Err::<Vec<Vec<u8>>, BoxError>("registry unreachable".into()) },
                |_value| async { Ok::<(), BoxError>(()) },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConsensusError::Sample(_)));
    }

    #[tokio::test]
    async fn commit_failure_aborts_and_blocks_reuse() {
        let mut engine = Engine::new(params(2, 2, 2), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();

        let err = engine
            .sync(
                &cancel,
                |k| async move { Ok::<_, BoxError>(vec![vec![0x01]; k]) },
                |_value| async { Err::<(), BoxError>("store rejected the write".into()) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::Commit(_)));

        // The failed run never completed, so the engine still counts as
        // running and a second invocation is rejected.
        let err = engine
            .sync(
                &cancel,
                |k| async move { Ok::<_, BoxError>(vec![vec![0x01]; k]) },
                |_value| async { Ok::<(), BoxError>(()) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConsensusError::AlreadyRunning));
    }

    #[tokio::test]
    async fn pre_cancelled_token_exits_before_sampling() {
        let mut engine = Engine::new(params(2, 2, 2), vec![0x01]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sample_calls = Cell::new(0usize);

        let outcome = engine
            .sync(
                &cancel,
                |_k| {
                    sample_calls.set(sample_calls.get() + 1);
                    async { Ok::<_, BoxError>(vec![]) }
                },
                |_value| async { Ok::<(), BoxError>(()) },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Cancelled);
        assert_eq!(sample_calls.get(), 0);
    }
}

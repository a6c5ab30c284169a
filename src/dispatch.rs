//! Concurrent fan-out of many queries against one shared index.
//!
//! A fixed pool of worker threads pulls tasks from a bounded channel, runs
//! the query executor against the shared read-only index (no locking: search
//! mutates nothing), and pushes results onto a result channel drained by the
//! submitting thread. Scoped threads guarantee every worker is joined before
//! the batch is reported complete, including on unwind paths.

use crossbeam_channel::bounded;
use std::thread;

use crate::align::AlignmentMatch;
use crate::error::Result;
use crate::reference::ReferenceIndex;

/// Worker pool configuration for batch search.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Capacity of the bounded task and result channels.
    pub queue_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            threads: num_cpus::get(),
            queue_depth: 64,
        }
    }
}

/// One query to run: an opaque caller-chosen id plus the sequence text.
#[derive(Debug, Clone)]
pub struct QueryTask {
    pub query_id: u64,
    pub sequence: String,
}

/// All matches for one completed task.
///
/// An executor error inside a worker is captured here per-task instead of
/// aborting the batch, so one bad query does not prevent others from
/// completing.
#[derive(Debug)]
pub struct QueryResult<'idx> {
    pub query_id: u64,
    pub matches: Result<Vec<AlignmentMatch<'idx>>>,
}

/// Run every task against `index`, emitting each result to `sink` as it
/// completes.
///
/// Results arrive in completion order, not submission order; callers must
/// associate results through `query_id`, never through emission sequence.
/// Result content per `query_id` is independent of the thread count.
pub fn search_batch<'idx, F>(
    index: &'idx ReferenceIndex,
    tasks: Vec<QueryTask>,
    config: &DispatchConfig,
    mut sink: F,
) where
    F: FnMut(QueryResult<'idx>),
{
    let total = tasks.len();
    if total == 0 {
        return;
    }
    let workers = config.threads.max(1);
    let depth = config.queue_depth.max(1);
    let (task_tx, task_rx) = bounded::<QueryTask>(depth);
    let (result_tx, result_rx) = bounded::<QueryResult<'idx>>(depth);

    log::debug!("dispatching {} queries across {} workers", total, workers);

    thread::scope(|scope| {
        scope.spawn(move || {
            for task in tasks {
                if task_tx.send(task).is_err() {
                    break;
                }
            }
            // Dropping the sender closes the task queue and lets the
            // workers drain out.
        });

        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for task in task_rx.iter() {
                    let matches = index.search(&task.sequence);
                    let result = QueryResult {
                        query_id: task.query_id,
                        matches,
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        let mut emitted = 0usize;
        while emitted < total {
            match result_rx.recv() {
                Ok(result) => {
                    sink(result);
                    emitted += 1;
                }
                // All workers exited without delivering the full batch;
                // the scope will surface their panic.
                Err(_) => break,
            }
        }
        log::debug!("batch complete: {} of {} results emitted", emitted, total);
    });
}

/// Run every task against `index` and collect the results, unordered.
pub fn search_all<'idx>(
    index: &'idx ReferenceIndex,
    tasks: Vec<QueryTask>,
    config: &DispatchConfig,
) -> Vec<QueryResult<'idx>> {
    let mut results = Vec::with_capacity(tasks.len());
    search_batch(index, tasks, config, |result| results.push(result));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use crate::error::Error;
    use crate::reference::ReferenceIndexBuilder;
    use std::collections::HashMap;

    const CHR1: &str = "TGCATGCAGCTAGCTAACGTGATTACAGATTACACCTGAACCGGTTAACCGGAATTGGCC";
    const CHR2: &str = "AATTGCACTGATCAGGCTAGCTTAGACCAGTTGACCATGAATCTTGGCCA";

    fn test_index() -> ReferenceIndex {
        let mut builder = ReferenceIndexBuilder::new();
        builder.add("chr1", CHR1).unwrap();
        builder.add("chr2", CHR2).unwrap();
        builder.finalize(EngineOptions::default()).unwrap()
    }

    fn test_tasks() -> Vec<QueryTask> {
        // Substrings of both references plus queries with no match at all.
        let mut tasks = Vec::new();
        for (i, source) in [CHR1, CHR2].into_iter().enumerate() {
            for (j, start) in [0usize, 10, 20].into_iter().enumerate() {
                tasks.push(QueryTask {
                    query_id: (i * 10 + j) as u64,
                    sequence: source[start..start + 25].to_string(),
                });
            }
        }
        tasks.push(QueryTask {
            query_id: 90,
            sequence: "TTTTTTTTTTTTTTTTTTTTTTTTT".to_string(),
        });
        tasks.push(QueryTask {
            query_id: 91,
            sequence: "CCCCCCCCCCCCCCCCCCCCCCCCC".to_string(),
        });
        tasks
    }

    fn run(index: &ReferenceIndex, threads: usize) -> HashMap<u64, Vec<(String, u64, String)>> {
        let config = DispatchConfig {
            threads,
            queue_depth: 4,
        };
        let results = search_all(index, test_tasks(), &config);
        assert_eq!(results.len(), test_tasks().len());
        let mut by_id = HashMap::new();
        for result in results {
            let summary: Vec<(String, u64, String)> = result
                .matches
                .unwrap()
                .iter()
                .map(|m| (m.ref_id.to_string(), m.ref_begin, m.cigar.clone()))
                .collect();
            // Each query id must appear exactly once.
            assert!(by_id.insert(result.query_id, summary).is_none());
        }
        by_id
    }

    #[test]
    fn every_task_yields_exactly_one_result() {
        let index = test_index();
        let by_id = run(&index, 4);
        assert_eq!(by_id.len(), test_tasks().len());
        // Matching queries hit their own reference.
        assert!(by_id[&0].iter().all(|(name, _, _)| name == "chr1"));
        assert!(by_id[&10].iter().all(|(name, _, _)| name == "chr2"));
        // Unrelated queries complete with empty results.
        assert!(by_id[&90].is_empty());
        assert!(by_id[&91].is_empty());
    }

    #[test]
    fn result_content_is_identical_across_thread_counts() {
        let index = test_index();
        let single = run(&index, 1);
        let eight = run(&index, 8);
        assert_eq!(single, eight);
    }

    #[test]
    fn worker_errors_are_captured_per_task() {
        let index = test_index();
        let tasks = vec![
            QueryTask {
                query_id: 1,
                sequence: CHR1[0..25].to_string(),
            },
            QueryTask {
                query_id: 2,
                sequence: "GATTACAGATTACACCTGAXA".to_string(),
            },
            QueryTask {
                query_id: 3,
                sequence: CHR2[0..25].to_string(),
            },
        ];
        let results = search_all(&index, tasks, &DispatchConfig::default());
        assert_eq!(results.len(), 3);
        for result in results {
            match result.query_id {
                2 => assert!(matches!(
                    result.matches,
                    Err(Error::InvalidSymbol { symbol: 'X' })
                )),
                _ => assert!(!result.matches.unwrap().is_empty()),
            }
        }
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let index = test_index();
        let results = search_all(&index, Vec::new(), &DispatchConfig::default());
        assert!(results.is_empty());
    }
}

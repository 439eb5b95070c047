//! Best-candidate search for one reference record against a candidate pool.
//!
//! Each candidate is filtered (kind, nominal voltage, circuit), scored in
//! both orientations and ranked by the orientation-adjusted score. The
//! reported confidence never exceeds the weaker endpoint similarity.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::classify::classify;
use crate::config::{HomologConfig, ScoringConfig, ThresholdConfig, TieBreak, ToleranceConfig};
use crate::error::HomologError;
use crate::model::{CandidateRecord, CircuitId, ConfidenceTier, EquipmentKind, MatchResult, ParsedLine};
use crate::normalize::Normalizer;
use crate::similarity::Scorer;

// ---------------------------------------------------------------------------
// Pool + query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PoolEntry {
    record: CandidateRecord,
    key_a: String,
    key_b: String,
}

/// Candidate records with their endpoint keys normalized once up front.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: Vec<PoolEntry>,
}

impl CandidatePool {
    pub fn new(records: Vec<CandidateRecord>, normalizer: &Normalizer) -> Self {
        let entries = records
            .into_iter()
            .map(|record| PoolEntry {
                key_a: normalizer.normalize(&record.endpoint_a.bus_label),
                key_b: normalizer.normalize(&record.endpoint_b.bus_label),
                record,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CandidateRecord> {
        self.entries.get(index).map(|e| &e.record)
    }

    pub fn records(&self) -> impl Iterator<Item = &CandidateRecord> {
        self.entries.iter().map(|e| &e.record)
    }
}

/// The searchable view of one reference record.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    pub reference_id: String,
    pub key_a: String,
    pub key_b: String,
    /// Nominal voltage used by the voltage filter.
    pub voltage_kv: Option<f64>,
    pub voltage_a: Option<f64>,
    pub voltage_b: Option<f64>,
    pub circuit: Option<CircuitId>,
    pub kind: Option<EquipmentKind>,
}

impl MatchQuery {
    /// Build a query from a parsed reference name. `voltage_kv` overrides the
    /// voltage read from the name when the registry has its own column.
    pub fn from_parsed(
        reference_id: impl Into<String>,
        parsed: &ParsedLine,
        voltage_kv: Option<f64>,
        normalizer: &Normalizer,
    ) -> Self {
        Self {
            reference_id: reference_id.into(),
            key_a: normalizer.normalize(&parsed.endpoint_a.bus_label),
            key_b: normalizer.normalize(&parsed.endpoint_b.bus_label),
            voltage_kv: voltage_kv.or_else(|| parsed.nominal_voltage()),
            voltage_a: parsed.endpoint_a.voltage_kv,
            voltage_b: parsed.endpoint_b.voltage_kv,
            circuit: parsed.circuit,
            kind: Some(parsed.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Matcher {
    thresholds: ThresholdConfig,
    tolerance: ToleranceConfig,
    scoring: ScoringConfig,
    tie_break: TieBreak,
    scorer: Scorer,
}

/// Score of one surviving candidate.
#[derive(Debug, Clone, Copy)]
struct Scored {
    index: usize,
    rank: f64,
    base: f64,
    sim_a: f64,
    sim_b: f64,
    swapped: bool,
}

impl Matcher {
    pub fn new(config: &HomologConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            tolerance: config.tolerance,
            scoring: config.scoring,
            tie_break: config.tie_break,
            scorer: Scorer::new(config.scoring.containment_floor),
        }
    }

    /// Result for a reference that never reached the search (no pool, bad name).
    pub fn unmatched(reference_id: impl Into<String>) -> MatchResult {
        MatchResult {
            reference_id: reference_id.into(),
            matched_id: None,
            confidence: 0.0,
            sim_a: 0.0,
            sim_b: 0.0,
            orientation_swapped: false,
            requires_review: false,
            tier: ConfidenceTier::Unmatched,
            tied_candidates: 0,
            candidate_index: None,
        }
    }

    /// Best candidate for one query.
    pub fn best_match(&self, query: &MatchQuery, pool: &CandidatePool) -> MatchResult {
        let mut best: Option<Scored> = None;
        let mut tied = 0usize;

        for (index, entry) in pool.entries.iter().enumerate() {
            if !self.compatible(query, &entry.record) {
                continue;
            }
            let scored = self.score(query, entry, index);
            match best {
                None => {
                    best = Some(scored);
                    tied = 0;
                }
                Some(current) => match scored.rank.total_cmp(&current.rank) {
                    Ordering::Greater => {
                        best = Some(scored);
                        tied = 0;
                    }
                    Ordering::Equal => {
                        tied += 1;
                        if self.wins_tie(pool, &scored, &current) {
                            best = Some(scored);
                        }
                    }
                    Ordering::Less => {}
                },
            }
        }

        let Some(best) = best else {
            log::debug!("{}: no compatible candidate", query.reference_id);
            return Self::unmatched(query.reference_id.clone());
        };

        let confidence = best.rank.min(best.base).clamp(0.0, 100.0);
        let tier = classify(confidence, &self.thresholds);
        let accepted = tier.is_matched();

        MatchResult {
            reference_id: query.reference_id.clone(),
            matched_id: accepted.then(|| pool.entries[best.index].record.source_id.clone()),
            confidence,
            sim_a: best.sim_a,
            sim_b: best.sim_b,
            orientation_swapped: best.swapped,
            requires_review: tier.requires_review(),
            tier,
            tied_candidates: tied,
            candidate_index: accepted.then_some(best.index),
        }
    }

    /// Match every query against the pool. Output order equals query order.
    pub fn match_all(&self, queries: &[MatchQuery], pool: &CandidatePool) -> Vec<MatchResult> {
        queries.par_iter().map(|q| self.best_match(q, pool)).collect()
    }

    /// `match_all` on a dedicated pool of `threads` workers, or the global
    /// pool when unset.
    pub fn match_all_with_threads(
        &self,
        queries: &[MatchQuery],
        pool: &CandidatePool,
        threads: Option<usize>,
    ) -> Result<Vec<MatchResult>, HomologError> {
        match threads {
            None => Ok(self.match_all(queries, pool)),
            Some(n) => {
                let workers = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| HomologError::WorkerPool(e.to_string()))?;
                Ok(workers.install(|| self.match_all(queries, pool)))
            }
        }
    }

    fn compatible(&self, query: &MatchQuery, cand: &CandidateRecord) -> bool {
        if let Some(kind) = query.kind {
            if kind != cand.kind {
                return false;
            }
        }
        if let (Some(qv), Some(cv)) = (query.voltage_kv, cand.nominal_voltage()) {
            if (qv - cv).abs() > self.tolerance.voltage_kv {
                return false;
            }
        }
        if let (Some(qc), Some(cc)) = (query.circuit, cand.circuit) {
            if qc != cc {
                return false;
            }
        }
        true
    }

    fn score(&self, query: &MatchQuery, entry: &PoolEntry, index: usize) -> Scored {
        let aa = self.scorer.score(&query.key_a, &entry.key_a);
        let bb = self.scorer.score(&query.key_b, &entry.key_b);
        let ab = self.scorer.score(&query.key_a, &entry.key_b);
        let ba = self.scorer.score(&query.key_b, &entry.key_a);

        let normal = aa.min(bb);
        let swapped_score = ab.min(ba);
        let adjust_normal = self.orientation_adjustment(query, &entry.record, false);
        let adjust_swapped = self.orientation_adjustment(query, &entry.record, true);

        // Equal names on both sides (transformers): the per-side voltages decide.
        let swapped = match swapped_score.total_cmp(&normal) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => adjust_swapped > adjust_normal,
        };

        let (base, sim_a, sim_b, adjust) = if swapped {
            (swapped_score, ab, ba, adjust_swapped)
        } else {
            (normal, aa, bb, adjust_normal)
        };

        Scored {
            index,
            rank: base + adjust,
            base,
            sim_a,
            sim_b,
            swapped,
        }
    }

    /// Bonus when per-side voltages agree with the chosen orientation,
    /// penalty when they do not, zero when any side voltage is unknown.
    fn orientation_adjustment(&self, query: &MatchQuery, cand: &CandidateRecord, swapped: bool) -> f64 {
        if !self.scoring.orientation_adjustment {
            return 0.0;
        }
        let (ca, cb) = if swapped {
            (cand.endpoint_b.voltage_kv, cand.endpoint_a.voltage_kv)
        } else {
            (cand.endpoint_a.voltage_kv, cand.endpoint_b.voltage_kv)
        };
        match (query.voltage_a, query.voltage_b, ca, cb) {
            (Some(qa), Some(qb), Some(ca), Some(cb)) => {
                let tol = self.tolerance.voltage_kv;
                if (qa - ca).abs() <= tol && (qb - cb).abs() <= tol {
                    self.scoring.orientation_bonus
                } else {
                    -self.scoring.orientation_penalty
                }
            }
            _ => 0.0,
        }
    }

    /// Whether `challenger` replaces `current` on an exact score tie.
    fn wins_tie(&self, pool: &CandidatePool, challenger: &Scored, current: &Scored) -> bool {
        match self.tie_break {
            TieBreak::FirstSeen => false,
            TieBreak::LowestId => {
                let c = &pool.entries[challenger.index].record.source_id;
                let k = &pool.entries[current.index].record.source_id;
                c < k
            }
        }
    }
}

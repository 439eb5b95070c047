use crate::model::{ConfidenceTier, EquipmentKind, HomologRow, HomologSummary, MatchResult};

/// Reduce one side of a batch (reference vs a single candidate source).
pub fn compute_summary<'a, I>(results: I) -> HomologSummary
where
    I: IntoIterator<Item = (&'a MatchResult, Option<EquipmentKind>)>,
{
    let mut summary = HomologSummary::default();

    for (r, kind) in results {
        summary.total += 1;
        match r.tier {
            ConfidenceTier::High => summary.high += 1,
            ConfidenceTier::Medium => summary.medium += 1,
            ConfidenceTier::Low => summary.low += 1,
            ConfidenceTier::Unmatched => {}
        }
        if r.matched_id.is_some() {
            summary.matched += 1;
        } else {
            summary.unmatched += 1;
        }
        if r.requires_review {
            summary.requires_review += 1;
        }
        if r.matched_id.is_some() && r.orientation_swapped {
            summary.swapped += 1;
        }
        if r.tied_candidates > 0 {
            summary.exact_ties += 1;
        }
        if kind == Some(EquipmentKind::Transformer) {
            summary.transformers += 1;
        }
    }

    summary
}

/// Summaries for the operational and specifications sides of a row set.
pub fn summarize_rows(rows: &[HomologRow]) -> (HomologSummary, HomologSummary) {
    let operational = compute_summary(rows.iter().map(|r| (&r.operational, r.kind)));
    let specifications = compute_summary(rows.iter().map(|r| (&r.specifications, r.kind)));
    (operational, specifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(tier: ConfidenceTier, swapped: bool, ties: usize) -> MatchResult {
        let matched = tier != ConfidenceTier::Unmatched;
        MatchResult {
            reference_id: "ref".into(),
            matched_id: matched.then(|| "cand".to_string()),
            confidence: 0.0,
            sim_a: 0.0,
            sim_b: 0.0,
            orientation_swapped: swapped,
            requires_review: tier == ConfidenceTier::Low,
            tier,
            tied_candidates: ties,
            candidate_index: None,
        }
    }

    #[test]
    fn summary_counts() {
        let results = vec![
            (result(ConfidenceTier::High, false, 0), Some(EquipmentKind::Line)),
            (result(ConfidenceTier::High, true, 1), Some(EquipmentKind::Transformer)),
            (result(ConfidenceTier::Medium, false, 0), Some(EquipmentKind::Line)),
            (result(ConfidenceTier::Low, true, 0), None),
            (result(ConfidenceTier::Unmatched, true, 0), Some(EquipmentKind::Transformer)),
        ];
        let s = compute_summary(results.iter().map(|(r, k)| (r, *k)));

        assert_eq!(s.total, 5);
        assert_eq!(s.matched, 4);
        assert_eq!(s.unmatched, 1);
        assert_eq!(s.high, 2);
        assert_eq!(s.medium, 1);
        assert_eq!(s.low, 1);
        assert_eq!(s.requires_review, 1);
        // the unmatched row's flag is not counted
        assert_eq!(s.swapped, 2);
        assert_eq!(s.exact_ties, 1);
        assert_eq!(s.transformers, 2);
    }

    #[test]
    fn empty_summary() {
        let s = compute_summary(std::iter::empty());
        assert_eq!(s, HomologSummary::default());
    }
}

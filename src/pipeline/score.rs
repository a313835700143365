use super::Error;

/// The name of the one supported ranking criterion.
pub const ENRICHMENT_SCORE: &str = "enrichment_score";

/// Log-AUC enrichment score over a ranked is-active vector.
///
/// The ROC curve of the ranking (fraction of decoys seen vs. fraction of
/// actives seen) is integrated against a log-scaled x axis, cut off at
/// `alpha = 1/(e * num_decoys)`, then normalized so that a perfect ranking
/// scores 1.0, a random one about 0, and an inverted one negative.
pub fn enrichment_score(ranked_is_active: &[bool]) -> Result<f64, Error> {
    let num_actives = ranked_is_active.iter().filter(|b| **b).count();
    let num_decoys = ranked_is_active.len() - num_actives;
    if num_actives == 0 || num_decoys == 0 {
        return Err(Error::DegenerateRanking(num_actives, num_decoys));
    }

    // actives seen by the time d decoys have been passed, maximized per d:
    let mut actives_at_decoy = vec![0usize; num_decoys + 1];
    let mut actives_seen = 0;
    let mut decoys_seen = 0;
    for &is_active in ranked_is_active {
        if is_active {
            actives_seen += 1;
        } else {
            decoys_seen += 1;
        }
        actives_at_decoy[decoys_seen] = actives_seen;
    }

    let d = num_decoys as f64;
    let a = num_actives as f64;
    let alpha = 1.0 / (std::f64::consts::E * d);

    // step interpolation: y at the greatest recorded x <= w.
    // the epsilon keeps exact grid points from rounding down.
    let f = |w: f64| -> f64 {
        let idx = (((w * d) + 1e-9).floor() as usize).min(num_decoys);
        actives_at_decoy[idx] as f64 / a
    };

    // weights are the log-widths of the inter-decoy intervals, the first
    // truncated at alpha; the last point (1,1) is left out so there are
    // exactly num_decoys intervals:
    let mut area = (1.0 / (alpha * d)).ln() * f(alpha);
    for i in 1..num_decoys {
        let i = i as f64;
        area += ((i + 1.0) / i).ln() * f(i / d);
    }

    Ok((area - (1.0 - alpha)) / (-alpha.ln() - (1.0 - alpha)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(actives_first: usize, decoys: usize, actives_last: usize) -> Vec<bool> {
        let mut v = vec![true; actives_first];
        v.extend(vec![false; decoys]);
        v.extend(vec![true; actives_last]);
        v
    }

    #[test]
    fn test_perfect_ranking_scores_one() {
        let score = enrichment_score(&ranking(10, 100, 0)).unwrap();
        assert!((score - 1.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_inverted_ranking_scores_negative() {
        let score = enrichment_score(&ranking(0, 100, 10)).unwrap();
        assert!(score < 0.0, "score was {score}");
    }

    #[test]
    fn test_alternating_ranking_scores_near_zero() {
        let mut v = Vec::with_capacity(200);
        for _ in 0..100 {
            v.push(true);
            v.push(false);
        }
        let score = enrichment_score(&v).unwrap();
        assert!(score.abs() < 0.25, "score was {score}");
    }

    #[test]
    fn test_better_ranking_scores_higher() {
        let good = enrichment_score(&ranking(8, 100, 2)).unwrap();
        let worse = enrichment_score(&ranking(2, 100, 8)).unwrap();
        assert!(good > worse);
    }

    #[test]
    fn test_degenerate_rankings_are_rejected() {
        assert!(enrichment_score(&[true, true]).is_err());
        assert!(enrichment_score(&[false, false]).is_err());
        assert!(enrichment_score(&[]).is_err());
    }
}

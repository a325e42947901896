//! Nearest / second-nearest descriptor matching.

use rayon::prelude::*;

use super::{Feature, Match};
use crate::config::MatchConfig;

#[inline]
fn distance_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Match every feature of `features1` to its nearest neighbour in
/// `features2`, keeping it when the nearest distance is below
/// `significance_threshold` times the second-nearest distance.
///
/// Output is sorted by coordinates with exact duplicate correspondences
/// removed, so it does not depend on the thread count.
pub fn match_features(
    features1: &[Feature],
    features2: &[Feature],
    config: &MatchConfig,
) -> Vec<Match> {
    if features2.len() < 2 {
        return Vec::new();
    }
    let ratio_sq = config.significance_threshold * config.significance_threshold;

    let mut matches: Vec<Match> = features1
        .par_iter()
        .enumerate()
        .filter_map(|(i, f1)| {
            let mut best = (f32::INFINITY, usize::MAX);
            let mut second = f32::INFINITY;
            for (j, f2) in features2.iter().enumerate() {
                let d = distance_sq(&f1.descriptor, &f2.descriptor);
                if d < best.0 {
                    second = best.0;
                    best = (d, j);
                } else if d < second {
                    second = d;
                }
            }
            (best.0 < ratio_sq * second).then(|| {
                let f2 = &features2[best.1];
                Match {
                    index1: i,
                    index2: best.1,
                    p1: [f1.keypoint.x, f1.keypoint.y],
                    p2: [f2.keypoint.x, f2.keypoint.y],
                    distance: best.0.sqrt(),
                }
            })
        })
        .collect();

    let before = matches.len();
    dedup_matches(&mut matches);
    tracing::debug!(
        "matched {} -> {} features: {} correspondences ({} duplicates removed)",
        features1.len(),
        features2.len(),
        matches.len(),
        before - matches.len()
    );
    matches
}

/// Sort by `(x1, y1, x2, y2)` and drop exact coordinate duplicates.
pub(crate) fn dedup_matches(matches: &mut Vec<Match>) {
    let key = |m: &Match| [m.p1[0], m.p1[1], m.p2[0], m.p2[1]];
    matches.sort_by(|a, b| {
        key(a)
            .iter()
            .zip(key(b).iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index1.cmp(&b.index1))
    });
    matches.dedup_by(|a, b| key(a) == key(b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Keypoint, DESCRIPTOR_LEN};

    fn feature(x: f32, y: f32, hot: usize, noise: f32) -> Feature {
        let mut descriptor = [0.0f32; DESCRIPTOR_LEN];
        descriptor[hot] = 1.0;
        descriptor[(hot + 1) % DESCRIPTOR_LEN] = noise;
        Feature {
            keypoint: Keypoint {
                x,
                y,
                sigma: 1.6,
                angle: 0.0,
                octave: 0,
                response: 0.1,
            },
            descriptor,
        }
    }

    #[test]
    fn distinctive_features_pass_the_ratio_test() {
        let f1 = vec![feature(1.0, 1.0, 3, 0.0), feature(5.0, 5.0, 40, 0.0)];
        let f2 = vec![
            feature(11.0, 1.0, 3, 0.05),
            feature(15.0, 5.0, 40, 0.05),
            feature(20.0, 20.0, 90, 0.0),
        ];
        let m = match_features(&f1, &f2, &MatchConfig::default());
        assert_eq!(m.len(), 2);
        assert_eq!((m[0].index1, m[0].index2), (0, 0));
        assert_eq!(m[1].p2, [15.0, 5.0]);
    }

    #[test]
    fn ambiguous_features_are_rejected() {
        let f1 = vec![feature(1.0, 1.0, 3, 0.0)];
        let f2 = vec![feature(2.0, 2.0, 3, 0.1), feature(3.0, 3.0, 3, 0.12)];
        assert!(match_features(&f1, &f2, &MatchConfig::default()).is_empty());
    }

    #[test]
    fn too_few_candidates_give_no_matches() {
        let f1 = vec![feature(1.0, 1.0, 3, 0.0)];
        let f2 = vec![feature(2.0, 2.0, 3, 0.0)];
        assert!(match_features(&f1, &f2, &MatchConfig::default()).is_empty());
    }

    #[test]
    fn duplicate_correspondences_are_removed() {
        // Same location with two orientations matching the same target.
        let f1 = vec![feature(4.0, 4.0, 7, 0.0), feature(4.0, 4.0, 7, 0.01)];
        let f2 = vec![feature(9.0, 4.0, 7, 0.0), feature(30.0, 30.0, 100, 0.0)];
        let m = match_features(&f1, &f2, &MatchConfig::default());
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].index1, 0);
    }
}

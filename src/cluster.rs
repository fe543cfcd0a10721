//! Small deterministic k-means used for thresholds and glyph colors.

const MAX_ITERS: usize = 30;

#[derive(Debug, Clone)]
pub(crate) struct Cluster<const D: usize> {
    pub center: [f32; D],
    pub size: usize,
}

/// Lloyd iterations with a fixed, order-independent seeding: points are sorted
/// by component sum and `k` evenly spaced samples become the initial centers.
/// Returns only non-empty clusters, largest first.
pub(crate) fn kmeans<const D: usize>(points: &[[f32; D]], k: usize) -> Vec<Cluster<D>> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut centers = seed_centers(points, k);
    let mut assignments = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITERS {
        let mut changed = false;
        for (idx, point) in points.iter().enumerate() {
            let nearest = nearest_center(point, &centers);
            if assignments[idx] != nearest {
                assignments[idx] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0f64; D]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (point, &cluster) in points.iter().zip(&assignments) {
            counts[cluster] += 1;
            for d in 0..D {
                sums[cluster][d] += point[d] as f64;
            }
        }
        for (c, center) in centers.iter_mut().enumerate() {
            if counts[c] == 0 {
                continue;
            }
            for d in 0..D {
                center[d] = (sums[c][d] / counts[c] as f64) as f32;
            }
        }
    }

    let mut sizes = vec![0usize; centers.len()];
    for &cluster in &assignments {
        sizes[cluster] += 1;
    }
    let mut clusters: Vec<Cluster<D>> = centers
        .into_iter()
        .zip(sizes)
        .filter(|(_, size)| *size > 0)
        .map(|(center, size)| Cluster { center, size })
        .collect();
    // stable: ties keep seeding order
    clusters.sort_by(|a, b| b.size.cmp(&a.size));
    clusters
}

fn seed_centers<const D: usize>(points: &[[f32; D]], k: usize) -> Vec<[f32; D]> {
    let mut sorted: Vec<[f32; D]> = points.to_vec();
    sorted.sort_by(|a, b| {
        let sa: f32 = a.iter().sum();
        let sb: f32 = b.iter().sum();
        sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
    });
    let last = sorted.len() - 1;
    if k == 1 {
        return vec![sorted[last / 2]];
    }
    (0..k).map(|i| sorted[i * last / (k - 1)]).collect()
}

fn nearest_center<const D: usize>(point: &[f32; D], centers: &[[f32; D]]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (idx, center) in centers.iter().enumerate() {
        let dist: f32 = (0..D).map(|d| (point[d] - center[d]).powi(2)).sum();
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_obvious_groups() {
        let mut points = vec![[10.0f32]; 30];
        points.extend(vec![[240.0f32]; 10]);
        let clusters = kmeans(&points, 2);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, 30);
        assert!((clusters[0].center[0] - 10.0).abs() < f32::EPSILON);
        assert!((clusters[1].center[0] - 240.0).abs() < f32::EPSILON);
    }

    #[test]
    fn identical_points_collapse_to_one_cluster() {
        let points = vec![[5.0f32, 5.0, 5.0]; 12];
        let clusters = kmeans(&points, 3);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 12);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let points: Vec<[f32; 3]> = Vec::new();
        assert!(kmeans(&points, 3).is_empty());
    }
}

use crate::geo::{self, Point};
use serde::Serialize;
use std::collections::VecDeque;

/// Plausible urban-bus speed band; samples outside it are excluded from the
/// speed average, not clamped.
const SPEED_BAND_KMH: (f64, f64) = (3.0, 80.0);
/// Minimum displayed speed.
const SPEED_FLOOR_KMH: f64 = 5.0;

const SPREAD_HIGH_M: f64 = 10.0;
const SPREAD_MEDIUM_M: f64 = 20.0;

/// One buffered passenger ping, as consumed by clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PingSample {
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A consensus position estimate derived from spatially-agreeing pings.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFix {
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    /// Number of pings in the winning cluster.
    pub crowd_count: usize,
    pub confidence: Confidence,
    /// Max distance from any cluster member to the centroid, meters.
    pub spread_m: f64,
}

/// Cluster a window of noisy passenger pings into one authoritative position,
/// speed and confidence tier. Returns None below the density threshold.
///
/// Points are projected into local meter space (reference latitude = first
/// ping), then grouped with density-based clustering. The largest cluster is
/// the vehicle; everything outside a dense neighborhood is an outlier and is
/// deliberately excluded from the position average.
pub fn detect_vehicle(
    pings: &[PingSample],
    eps_meters: f64,
    min_points: usize,
) -> Option<ResolvedFix> {
    if pings.len() < min_points {
        return None;
    }

    let ref_lat = pings[0].lat;
    let points: Vec<(f64, f64)> = pings
        .iter()
        .map(|p| geo::to_local_meters(Point::new(p.lat, p.lng), ref_lat))
        .collect();

    let clusters = dbscan(&points, eps_meters, min_points);

    // Largest cluster wins; ties go to the first-found.
    let mut main: Option<&Vec<usize>> = None;
    for cluster in &clusters {
        if main.map_or(true, |m| cluster.len() > m.len()) {
            main = Some(cluster);
        }
    }
    let members = main?;

    let avg_lat = members.iter().map(|&i| pings[i].lat).sum::<f64>() / members.len() as f64;
    let avg_lng = members.iter().map(|&i| pings[i].lng).sum::<f64>() / members.len() as f64;

    let in_band: Vec<f64> = members
        .iter()
        .map(|&i| pings[i].speed_kmh)
        .filter(|s| (SPEED_BAND_KMH.0..=SPEED_BAND_KMH.1).contains(s))
        .collect();
    let avg_speed = if in_band.is_empty() {
        0.0
    } else {
        in_band.iter().sum::<f64>() / in_band.len() as f64
    };

    let centroid = Point::new(avg_lat, avg_lng);
    let spread_m = members
        .iter()
        .map(|&i| geo::haversine_m(centroid, Point::new(pings[i].lat, pings[i].lng)))
        .fold(0.0_f64, f64::max);

    let confidence = if spread_m < SPREAD_HIGH_M {
        Confidence::High
    } else if spread_m < SPREAD_MEDIUM_M {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Some(ResolvedFix {
        lat: round6(avg_lat),
        lng: round6(avg_lng),
        speed_kmh: SPEED_FLOOR_KMH.max(round1(avg_speed)),
        crowd_count: members.len(),
        confidence,
        spread_m: spread_m.round(),
    })
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

const UNVISITED: i32 = -2;
const NOISE: i32 = -1;

/// Density-based clustering over planar points. Returns clusters as index
/// sets; noise points belong to no cluster.
fn dbscan(points: &[(f64, f64)], eps: f64, min_points: usize) -> Vec<Vec<usize>> {
    let mut labels = vec![UNVISITED; points.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..points.len() {
        if labels[i] != UNVISITED {
            continue;
        }
        let neighbors = region_query(points, i, eps);
        if neighbors.len() < min_points {
            labels[i] = NOISE;
            continue;
        }

        let cluster_id = clusters.len() as i32;
        let mut members = vec![i];
        labels[i] = cluster_id;

        let mut queue: VecDeque<usize> = neighbors.into();
        while let Some(j) = queue.pop_front() {
            if labels[j] == NOISE {
                labels[j] = cluster_id;
                members.push(j);
                continue;
            }
            if labels[j] != UNVISITED {
                continue;
            }
            labels[j] = cluster_id;
            members.push(j);

            let expansion = region_query(points, j, eps);
            if expansion.len() >= min_points {
                queue.extend(expansion);
            }
        }

        clusters.push(members);
    }

    clusters
}

fn region_query(points: &[(f64, f64)], center: usize, eps: f64) -> Vec<usize> {
    let (cx, cy) = points[center];
    points
        .iter()
        .enumerate()
        .filter(|(_, (x, y))| {
            let dx = x - cx;
            let dy = y - cy;
            (dx * dx + dy * dy).sqrt() <= eps
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 25.0;
    const MIN: usize = 5;

    fn ping(lat: f64, lng: f64, speed: f64) -> PingSample {
        PingSample { lat, lng, speed_kmh: speed }
    }

    /// ~5 m offsets around a base coordinate near Delhi.
    fn tight_cluster(n: usize, speed: f64) -> Vec<PingSample> {
        let deg_m = 1.0 / 111_200.0; // one meter of latitude, in degrees
        (0..n)
            .map(|i| {
                let off = (i as f64 - n as f64 / 2.0) * deg_m;
                ping(28.6300 + off, 77.2200 + off * 0.5, speed)
            })
            .collect()
    }

    #[test]
    fn returns_none_below_min_points() {
        let pings = tight_cluster(4, 20.0);
        assert!(detect_vehicle(&pings, EPS, MIN).is_none());
        assert!(detect_vehicle(&[], EPS, MIN).is_none());
    }

    #[test]
    fn returns_none_when_no_dense_cluster_exists() {
        // 6 points, each ~500 m from the next: no 25 m neighborhood holds 5
        let pings: Vec<PingSample> = (0..6)
            .map(|i| ping(28.6300 + i as f64 * 0.005, 77.2200, 20.0))
            .collect();
        assert!(detect_vehicle(&pings, EPS, MIN).is_none());
    }

    #[test]
    fn outliers_are_excluded_from_the_average() {
        let mut pings = tight_cluster(5, 20.0);
        let expected_lat =
            pings.iter().map(|p| p.lat).sum::<f64>() / pings.len() as f64;
        let expected_lng =
            pings.iter().map(|p| p.lng).sum::<f64>() / pings.len() as f64;

        // isolated outliers well beyond 30 m
        pings.push(ping(28.6400, 77.2200, 20.0));
        pings.push(ping(28.6300, 77.2400, 20.0));

        let fix = detect_vehicle(&pings, EPS, MIN).unwrap();
        assert_eq!(fix.crowd_count, 5);
        assert!((fix.lat - expected_lat).abs() < 1e-5);
        assert!((fix.lng - expected_lng).abs() < 1e-5);
        assert_eq!(fix.confidence, Confidence::High);
    }

    #[test]
    fn six_agreeing_reporters_resolve_high_confidence() {
        let pings = tight_cluster(6, 20.0);
        let fix = detect_vehicle(&pings, EPS, MIN).unwrap();

        let d = geo::haversine_m(
            Point::new(fix.lat, fix.lng),
            Point::new(28.6300, 77.2200),
        );
        assert!(d < 5.0, "fix {d:.1} m from true position");
        assert!((18.0..=22.0).contains(&fix.speed_kmh));
        assert_eq!(fix.confidence, Confidence::High);
        assert_eq!(fix.crowd_count, 6);
    }

    #[test]
    fn out_of_band_speeds_do_not_contribute() {
        let mut pings = tight_cluster(5, 30.0);
        pings[0].speed_kmh = 120.0; // GPS glitch
        pings[1].speed_kmh = 0.5; // stationary phone
        let fix = detect_vehicle(&pings, EPS, MIN).unwrap();
        assert!((fix.speed_kmh - 30.0).abs() < 0.2);
    }

    #[test]
    fn all_speeds_out_of_band_degrades_to_floor() {
        let pings = tight_cluster(5, 0.0);
        let fix = detect_vehicle(&pings, EPS, MIN).unwrap();
        assert_eq!(fix.speed_kmh, 5.0);
    }

    #[test]
    fn wide_cluster_reports_low_confidence() {
        let deg_m = 1.0 / 111_200.0;
        // 6 points spread across ~60 m, still within eps of neighbors
        let pings: Vec<PingSample> = (0..6)
            .map(|i| ping(28.6300 + i as f64 * 12.0 * deg_m, 77.2200, 20.0))
            .collect();
        let fix = detect_vehicle(&pings, EPS, MIN).unwrap();
        assert_eq!(fix.confidence, Confidence::Low);
        assert!(fix.spread_m >= 20.0);
    }
}

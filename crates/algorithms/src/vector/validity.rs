//! Structural validity checks for polygonal geometry
//!
//! Used to accept or reject topology-preserving simplification results.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Intersects, Line, LineString, MultiPolygon, Point, Polygon};

/// Why a polygonal geometry is invalid
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    /// A ring has fewer than four coordinates or is not closed
    DegenerateRing { polygon: usize, ring: usize },
    /// A ring encloses no area
    ZeroAreaRing { polygon: usize, ring: usize },
    /// Two segments cross or overlap
    SelfIntersection { at: Coord<f64> },
    /// A hole lies (partly) outside its shell
    HoleOutsideShell { polygon: usize, ring: usize },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::DegenerateRing { polygon, ring } => {
                write!(f, "ring {} of polygon {} is degenerate", ring, polygon)
            }
            InvalidReason::ZeroAreaRing { polygon, ring } => {
                write!(f, "ring {} of polygon {} has zero area", ring, polygon)
            }
            InvalidReason::SelfIntersection { at } => {
                write!(f, "self-intersection at ({}, {})", at.x, at.y)
            }
            InvalidReason::HoleOutsideShell { polygon, ring } => {
                write!(f, "hole {} of polygon {} is outside its shell", ring, polygon)
            }
        }
    }
}

/// One ring segment with its position, for adjacency tests
struct Segment {
    ring: usize,
    index: usize,
    ring_len: usize,
    line: Line<f64>,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Segment {
    fn adjacent(&self, other: &Segment) -> bool {
        if self.ring != other.ring {
            return false;
        }
        let (a, b) = (self.index.min(other.index), self.index.max(other.index));
        b == a + 1 || (a == 0 && b + 1 == self.ring_len)
    }
}

fn signed_area(ring: &LineString<f64>) -> f64 {
    ring.lines()
        .map(|l| l.start.x * l.end.y - l.end.x * l.start.y)
        .sum::<f64>()
        / 2.0
}

/// Validate a multipolygon.
///
/// Rings must be closed with at least four coordinates and non-zero area.
/// No two segments may cross or overlap; rings of different parts may touch
/// at single points, a ring may not touch itself. Every hole vertex must lie
/// inside or on its shell.
pub fn check_multipolygon(mp: &MultiPolygon<f64>) -> Result<(), InvalidReason> {
    let mut segments = Vec::new();
    let mut ring_id = 0usize;

    for (pi, polygon) in mp.0.iter().enumerate() {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors().iter());
        for (ri, ring) in rings.enumerate() {
            if ring.0.len() < 4 || !ring.is_closed() {
                return Err(InvalidReason::DegenerateRing { polygon: pi, ring: ri });
            }
            if signed_area(ring).abs() <= f64::EPSILON {
                return Err(InvalidReason::ZeroAreaRing { polygon: pi, ring: ri });
            }
            let ring_len = ring.0.len() - 1;
            for (index, line) in ring.lines().enumerate() {
                segments.push(Segment {
                    ring: ring_id,
                    index,
                    ring_len,
                    line,
                    min_x: line.start.x.min(line.end.x),
                    max_x: line.start.x.max(line.end.x),
                    min_y: line.start.y.min(line.end.y),
                    max_y: line.start.y.max(line.end.y),
                });
            }
            ring_id += 1;
        }

        let shell = Polygon::new(polygon.exterior().clone(), vec![]);
        for (hi, hole) in polygon.interiors().iter().enumerate() {
            if hole.0.iter().any(|c| !shell.intersects(&Point::from(*c))) {
                return Err(InvalidReason::HoleOutsideShell {
                    polygon: pi,
                    ring: hi + 1,
                });
            }
        }
    }

    // Sweep over x to keep the pairwise test local
    segments.sort_by(|a, b| a.min_x.total_cmp(&b.min_x));
    for i in 0..segments.len() {
        let a = &segments[i];
        for b in segments[i + 1..].iter() {
            if b.min_x > a.max_x {
                break;
            }
            if b.min_y > a.max_y || b.max_y < a.min_y {
                continue;
            }
            let Some(hit) = line_intersection(a.line, b.line) else {
                continue;
            };
            match hit {
                LineIntersection::Collinear { intersection } => {
                    return Err(InvalidReason::SelfIntersection {
                        at: intersection.start,
                    });
                }
                LineIntersection::SinglePoint {
                    intersection,
                    is_proper,
                } => {
                    if is_proper || (a.ring == b.ring && !a.adjacent(b)) {
                        return Err(InvalidReason::SelfIntersection { at: intersection });
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_square_with_hole_is_valid() {
        let p = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]]
        );
        assert_eq!(check_multipolygon(&MultiPolygon::new(vec![p])), Ok(()));
    }

    #[test]
    fn test_bowtie_is_invalid() {
        let p = polygon![
            (x: 0.0, y: 0.0), (x: 3.0, y: 3.0), (x: 3.0, y: 0.0), (x: 0.0, y: 2.0)
        ];
        assert!(matches!(
            check_multipolygon(&MultiPolygon::new(vec![p])),
            Err(InvalidReason::SelfIntersection { .. })
        ));
    }

    #[test]
    fn test_hole_outside_shell_is_invalid() {
        let p = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0)]]
        );
        assert!(matches!(
            check_multipolygon(&MultiPolygon::new(vec![p])),
            Err(InvalidReason::HoleOutsideShell { .. })
        ));
    }

    #[test]
    fn test_collapsed_ring_is_invalid() {
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        let p = Polygon::new(ring, vec![]);
        assert!(matches!(
            check_multipolygon(&MultiPolygon::new(vec![p])),
            Err(InvalidReason::DegenerateRing { .. })
        ));
    }

    #[test]
    fn test_overlapping_parts_are_invalid() {
        let a = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let b = polygon![(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)];
        assert!(check_multipolygon(&MultiPolygon::new(vec![a, b])).is_err());
    }
}

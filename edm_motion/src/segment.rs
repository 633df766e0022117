//! Linear path segments with a bidirectional cursor.
//!
//! Servo feed does not follow a time-planned profile: the gap servo decides
//! every cycle how far to move, forward or backward. [`SegmentList`] keeps
//! the resulting cursor on a polyline of concatenated [`LinearSegment`]s and
//! clamps it at both ends.

use edm_common::axis::AxisVec;
use edm_common::consts::MAX_WAYPOINTS;

/// Cursor distance treated as being on an end point [blu].
const CURSOR_EPS: f64 = 1e-9;

/// Straight segment between two absolute points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSegment {
    start: AxisVec,
    end: AxisVec,
    unit: AxisVec,
    length: f64,
}

impl LinearSegment {
    /// `None` for a zero-length segment.
    pub fn new(start: AxisVec, end: AxisVec) -> Option<Self> {
        let delta = end - start;
        let unit = delta.unit()?;
        Some(Self { start, end, unit, length: delta.norm() })
    }

    /// Point at distance `s` from the start (clamped to the segment).
    pub fn point_at(&self, s: f64) -> AxisVec {
        if s >= self.length {
            self.end
        } else if s <= 0.0 {
            self.start
        } else {
            self.start + self.unit * s
        }
    }

    #[inline]
    pub fn start(&self) -> AxisVec {
        self.start
    }

    #[inline]
    pub fn end(&self) -> AxisVec {
        self.end
    }

    /// Unit direction.
    #[inline]
    pub fn direction(&self) -> AxisVec {
        self.unit
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }
}

/// Polyline with a cursor that moves forward and backward across segments.
#[derive(Debug, Clone)]
pub struct SegmentList {
    segments: heapless::Vec<LinearSegment, MAX_WAYPOINTS>,
    index: usize,
    /// Distance into `segments[index]`.
    offset: f64,
    /// Distance from the path start.
    cursor: f64,
    total: f64,
}

impl SegmentList {
    /// Build the path `start → waypoints[0] → waypoints[1] → …`.
    ///
    /// Zero-length hops are skipped. Returns `None` when no segment remains
    /// or there are more than `MAX_WAYPOINTS` waypoints.
    pub fn from_waypoints(start: AxisVec, waypoints: &[AxisVec]) -> Option<Self> {
        let mut segments = heapless::Vec::new();
        let mut from = start;
        for &to in waypoints {
            if !to.is_finite() {
                return None;
            }
            if let Some(seg) = LinearSegment::new(from, to) {
                segments.push(seg).ok()?;
                from = to;
            }
        }
        if segments.is_empty() {
            return None;
        }
        let total = segments.iter().map(LinearSegment::length).sum();
        Some(Self { segments, index: 0, offset: 0.0, cursor: 0.0, total })
    }

    /// Move the cursor by `delta` (negative = backwards).
    ///
    /// Returns the distance actually moved, which is smaller in magnitude
    /// than `delta` when an end of the path is hit.
    pub fn advance(&mut self, delta: f64) -> f64 {
        if !delta.is_finite() || delta == 0.0 {
            return 0.0;
        }
        let before = self.cursor;
        let mut left = delta.abs();

        if delta > 0.0 {
            loop {
                let room = self.segments[self.index].length - self.offset;
                if left <= room {
                    self.offset += left;
                    break;
                }
                left -= room;
                if self.index + 1 == self.segments.len() {
                    self.offset = self.segments[self.index].length;
                    break;
                }
                self.index += 1;
                self.offset = 0.0;
            }
        } else {
            loop {
                if left <= self.offset {
                    self.offset -= left;
                    break;
                }
                left -= self.offset;
                if self.index == 0 {
                    self.offset = 0.0;
                    break;
                }
                self.index -= 1;
                self.offset = self.segments[self.index].length;
            }
        }

        self.cursor = self.segments[..self.index]
            .iter()
            .map(LinearSegment::length)
            .sum::<f64>()
            + self.offset;
        self.cursor - before
    }

    /// Current absolute position.
    pub fn position(&self) -> AxisVec {
        self.segments[self.index].point_at(self.offset)
    }

    /// Feed direction of the current segment.
    #[inline]
    pub fn direction(&self) -> AxisVec {
        self.segments[self.index].direction()
    }

    #[inline]
    pub fn at_start(&self) -> bool {
        self.index == 0 && self.offset <= CURSOR_EPS
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.index + 1 == self.segments.len()
            && self.offset >= self.segments[self.index].length - CURSOR_EPS
    }

    /// Distance from the path start [blu].
    #[inline]
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Distance from the start of the current segment [blu].
    #[inline]
    pub fn segment_offset(&self) -> f64 {
        self.offset
    }

    #[inline]
    pub fn remaining(&self) -> f64 {
        (self.total - self.cursor).max(0.0)
    }

    /// Total path length [blu].
    #[inline]
    pub fn length(&self) -> f64 {
        self.total
    }

    #[inline]
    pub fn segment_index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Path start point.
    #[inline]
    pub fn start_point(&self) -> AxisVec {
        self.segments[0].start()
    }

    /// Path end point.
    #[inline]
    pub fn end_point(&self) -> AxisVec {
        self.segments[self.segments.len() - 1].end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(x: f64, y: f64) -> AxisVec {
        AxisVec::from_slice(&[x, y])
    }

    fn l_path() -> SegmentList {
        SegmentList::from_waypoints(xy(0.0, 0.0), &[xy(10.0, 0.0), xy(10.0, 5.0)]).unwrap()
    }

    #[test]
    fn builds_and_skips_zero_length() {
        let path =
            SegmentList::from_waypoints(xy(0.0, 0.0), &[xy(0.0, 0.0), xy(3.0, 4.0)]).unwrap();
        assert_eq!(path.segment_count(), 1);
        assert_eq!(path.length(), 5.0);
        assert!(path.at_start());
        assert!(!path.at_end());

        assert!(SegmentList::from_waypoints(xy(1.0, 1.0), &[xy(1.0, 1.0)]).is_none());
        assert!(SegmentList::from_waypoints(xy(1.0, 1.0), &[]).is_none());
    }

    #[test]
    fn forward_across_corner() {
        let mut path = l_path();
        assert_eq!(path.advance(12.0), 12.0);
        assert_eq!(path.segment_index(), 1);
        assert!(path.position().approx_eq(&xy(10.0, 2.0), 1e-12));
        assert!(path.direction().approx_eq(&xy(0.0, 1.0), 1e-12));
        assert_eq!(path.cursor(), 12.0);
    }

    #[test]
    fn backward_across_corner() {
        let mut path = l_path();
        path.advance(12.0);
        assert_eq!(path.advance(-4.0), -4.0);
        assert_eq!(path.segment_index(), 0);
        assert!(path.position().approx_eq(&xy(8.0, 0.0), 1e-12));
    }

    #[test]
    fn clamps_at_both_ends() {
        let mut path = l_path();
        assert_eq!(path.advance(-1.0), 0.0);
        assert!(path.at_start());

        let moved = path.advance(100.0);
        assert_eq!(moved, 15.0);
        assert!(path.at_end());
        assert_eq!(path.position(), xy(10.0, 5.0));
        assert_eq!(path.remaining(), 0.0);

        assert_eq!(path.advance(-20.0), -15.0);
        assert!(path.at_start());
        assert_eq!(path.position(), xy(0.0, 0.0));
    }

    #[test]
    fn ignores_non_finite_delta() {
        let mut path = l_path();
        assert_eq!(path.advance(f64::NAN), 0.0);
        assert!(path.at_start());
    }
}

//! Dense trajectory sample buffer and the two row types stored in it:
//! `BaseTrajData` (raw integrator output, four PCHIP-interpolable fields)
//! and `TrajectoryData` (the derived, unit-and-angle-resolved row the rest
//! of the crate and its callers actually consume).

use crate::interp::interpolate_3pt;
use crate::v3::V3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an integration run stopped advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TerminationReason {
    NoTerminate,
    TargetRangeReached,
    MinimumVelocityReached,
    MaximumDropReached,
    MinimumAltitudeReached,
    HandlerRequestedStop,
}

/// Bitset of trajectory-point kinds a [`crate::traj_data`] consumer asked to
/// be recorded. Values match the original bit layout so a caller migrating
/// an existing flag combination keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrajFlag(u32);

impl TrajFlag {
    pub const NONE: TrajFlag = TrajFlag(0);
    pub const ZERO_UP: TrajFlag = TrajFlag(1);
    pub const ZERO_DOWN: TrajFlag = TrajFlag(2);
    pub const ZERO: TrajFlag = TrajFlag(Self::ZERO_UP.0 | Self::ZERO_DOWN.0);
    pub const MACH: TrajFlag = TrajFlag(4);
    pub const RANGE: TrajFlag = TrajFlag(8);
    pub const APEX: TrajFlag = TrajFlag(16);
    pub const ALL: TrajFlag = TrajFlag(31);
    /// Multiple-row-per-time marker: this point was recorded alongside
    /// another at (near enough) the same time rather than merged into it.
    pub const MRT: TrajFlag = TrajFlag(32);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: TrajFlag) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn intersects(self, other: TrajFlag) -> bool {
        (self.0 & other.0) != 0
    }

    /// Clears every bit set in `other`, leaving the rest untouched. Used to
    /// permanently disable a requested event kind once the starting state of
    /// a run rules it out (e.g. a shot that starts above the sightline can
    /// never record a `ZERO_UP` crossing).
    pub const fn without(self, other: TrajFlag) -> TrajFlag {
        TrajFlag(self.0 & !other.0)
    }
}

impl std::ops::BitOr for TrajFlag {
    type Output = TrajFlag;
    fn bitor(self, rhs: TrajFlag) -> TrajFlag {
        TrajFlag(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TrajFlag {
    fn bitor_assign(&mut self, rhs: TrajFlag) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for TrajFlag {
    type Output = TrajFlag;
    fn bitand(self, rhs: TrajFlag) -> TrajFlag {
        TrajFlag(self.0 & rhs.0)
    }
}

impl Default for TrajFlag {
    fn default() -> Self {
        TrajFlag::NONE
    }
}

/// Which field of a [`BaseTrajData`] row to use as the independent
/// interpolation variable, or to read out of an interpolated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseTrajInterpKey {
    Time,
    PosX,
    PosY,
    PosZ,
    VelX,
    VelY,
    VelZ,
    Mach,
}

/// One raw sample emitted by an integrator: time, position, velocity, and
/// the local Mach-1 speed at that point. Everything derived (drop, windage,
/// energy, spin drift, ...) lives on [`TrajectoryData`] instead.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BaseTrajData {
    pub time: f64,
    pub position: V3,
    pub velocity: V3,
    pub mach: f64,
}

impl BaseTrajData {
    /// Reads out the field `key` names. Public so handlers outside this
    /// crate can bracket a crossing on an arbitrary key without duplicating
    /// this match.
    pub fn key_value(&self, key: BaseTrajInterpKey) -> f64 {
        match key {
            BaseTrajInterpKey::Time => self.time,
            BaseTrajInterpKey::PosX => self.position.x,
            BaseTrajInterpKey::PosY => self.position.y,
            BaseTrajInterpKey::PosZ => self.position.z,
            BaseTrajInterpKey::VelX => self.velocity.x,
            BaseTrajInterpKey::VelY => self.velocity.y,
            BaseTrajInterpKey::VelZ => self.velocity.z,
            BaseTrajInterpKey::Mach => self.mach,
        }
    }

    /// Slant height at this row for a given look angle: the projection used
    /// when searching/interpolating by slant distance rather than by range.
    fn slant_val(&self, look_angle_cos: f64, look_angle_sin: f64) -> f64 {
        self.position.y * look_angle_cos - self.position.x * look_angle_sin
    }

    /// Three-point PCHIP interpolation of every field of `p0`/`p1`/`p2`
    /// against `key_value(interp_key) == x`, field by field. When `key`
    /// itself is the interpolation key this is an identity: the requested
    /// value is returned directly rather than interpolated against itself.
    /// Public so a handler bracketing a crossing on an arbitrary key can
    /// reuse it without going through a [`BaseTrajSeq`].
    pub fn interpolate3pt(
        x: f64,
        p0: &BaseTrajData,
        p1: &BaseTrajData,
        p2: &BaseTrajData,
        interp_key: BaseTrajInterpKey,
    ) -> BaseTrajData {
        let field = |key: BaseTrajInterpKey| -> f64 {
            if key == interp_key {
                return x;
            }
            interpolate_3pt(
                x,
                p0.key_value(interp_key),
                p1.key_value(interp_key),
                p2.key_value(interp_key),
                p0.key_value(key),
                p1.key_value(key),
                p2.key_value(key),
            )
        };

        BaseTrajData {
            time: field(BaseTrajInterpKey::Time),
            position: V3::new(
                field(BaseTrajInterpKey::PosX),
                field(BaseTrajInterpKey::PosY),
                field(BaseTrajInterpKey::PosZ),
            ),
            velocity: V3::new(
                field(BaseTrajInterpKey::VelX),
                field(BaseTrajInterpKey::VelY),
                field(BaseTrajInterpKey::VelZ),
            ),
            mach: field(BaseTrajInterpKey::Mach),
        }
    }
}

/// Minimum capacity reserved up front: most shots land well under this many
/// recorded points, so the backing `Vec` rarely reallocates.
const MIN_CAPACITY: usize = 256;

/// Epsilon below which two candidate key values are treated as equal, to
/// avoid a zero-width (divide-by-zero) PCHIP segment.
const DUPLICATE_KEY_EPSILON: f64 = 1e-9;

/// Dense, append-only buffer of [`BaseTrajData`] rows produced by an
/// integrator, with PCHIP-interpolated lookup by any field or by slant
/// height. A thin newtype over `Vec<BaseTrajData>`, not a manual ring or
/// growth scheme: `Vec`'s own amortized-doubling growth is already the
/// right behavior here.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BaseTrajSeq(Vec<BaseTrajData>);

impl BaseTrajSeq {
    pub fn new() -> Self {
        BaseTrajSeq(Vec::with_capacity(MIN_CAPACITY))
    }

    pub fn append(&mut self, row: BaseTrajData) {
        self.0.push(row);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indexes into the buffer, with Python-style negative indices counting
    /// back from the end (`-1` is the last row).
    pub fn get_item(&self, index: isize) -> Option<&BaseTrajData> {
        let len = self.0.len() as isize;
        let resolved = if index < 0 { index + len } else { index };
        if resolved < 0 || resolved >= len {
            None
        } else {
            Some(&self.0[resolved as usize])
        }
    }

    pub fn as_slice(&self) -> &[BaseTrajData] {
        &self.0
    }

    /// Binary search for the index `i` such that the bracket `[i-1, i, i+1]`
    /// straddles `target`, clamped to `[1, len-2]` so the three-point
    /// stencil around the result is always in bounds. Detects whether `key`
    /// increases or decreases across the buffer from the endpoints.
    fn bisect_center(&self, target: f64, key: impl Fn(&BaseTrajData) -> f64) -> usize {
        let n = self.0.len();
        debug_assert!(n >= 3, "bisect_center needs at least 3 rows");

        let increasing = key(&self.0[n - 1]) >= key(&self.0[0]);
        let (mut lo, mut hi) = (0usize, n - 1);

        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            let mid_key = key(&self.0[mid]);
            let before_target = if increasing {
                mid_key < target
            } else {
                mid_key > target
            };
            if before_target {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        lo.clamp(1, n.saturating_sub(2))
    }

    fn try_exact(&self, idx: usize, target: f64, key: impl Fn(&BaseTrajData) -> f64) -> bool {
        (key(&self.0[idx]) - target).abs() < DUPLICATE_KEY_EPSILON
    }

    /// Whether the three-point stencil centered at `idx` straddles `target`
    /// in `key`, respecting whichever direction `key` runs across the buffer.
    fn brackets(&self, idx: usize, target: f64, increasing: bool, key: &impl Fn(&BaseTrajData) -> f64) -> bool {
        let (lo, hi) = (key(&self.0[idx - 1]), key(&self.0[idx + 1]));
        if increasing {
            lo <= target && target <= hi
        } else {
            hi <= target && target <= lo
        }
    }

    /// Fast path for a repeated lookup along a roughly monotone scan: seeks
    /// the row nearest `start_time_hint` by bisecting on time, then sweeps
    /// forward/backward from there for the bracket straddling `target`
    /// before falling back to a full `bisect_center`. Avoids re-bisecting
    /// the whole buffer from scratch when the caller already knows
    /// approximately where in time the answer lives.
    fn find_index_from_hint(
        &self,
        target: f64,
        start_time_hint: f64,
        key: impl Fn(&BaseTrajData) -> f64,
    ) -> usize {
        let n = self.0.len();
        let start = self.bisect_center(start_time_hint, |row| row.time);
        let increasing = key(&self.0[n - 1]) >= key(&self.0[0]);

        if self.brackets(start, target, increasing, &key) {
            return start;
        }

        let mut i = start;
        while i + 2 < n {
            i += 1;
            if self.brackets(i, target, increasing, &key) {
                return i;
            }
        }

        let mut i = start;
        while i > 1 {
            i -= 1;
            if self.brackets(i, target, increasing, &key) {
                return i;
            }
        }

        self.bisect_center(target, key)
    }

    fn interpolate_at_center(
        &self,
        center: usize,
        x: f64,
        key_fn: impl Fn(&BaseTrajData) -> f64,
        interp_key: BaseTrajInterpKey,
    ) -> BaseTrajData {
        let p0 = &self.0[center - 1];
        let p1 = &self.0[center];
        let p2 = &self.0[center + 1];

        let (k0, k1, k2) = (key_fn(p0), key_fn(p1), key_fn(p2));
        if k0 == k1 || k1 == k2 || k0 == k2 {
            return self.0[center];
        }

        BaseTrajData::interpolate3pt(x, p0, p1, p2, interp_key)
    }

    /// Interpolated lookup by an arbitrary field, e.g. time or downrange
    /// distance. Requires at least 3 rows. `start_time_hint`, when positive
    /// and `interp_key` isn't itself `Time`, seeds the search at that time
    /// instead of bisecting the whole buffer from scratch — useful for a
    /// caller doing repeated nearby lookups along one trajectory.
    pub fn get_at(&self, interp_key: BaseTrajInterpKey, target: f64, start_time_hint: f64) -> Option<BaseTrajData> {
        if self.0.len() < 3 {
            return None;
        }
        let key_fn = |row: &BaseTrajData| row.key_value(interp_key);

        let center = if start_time_hint > 0.0 && interp_key != BaseTrajInterpKey::Time {
            self.find_index_from_hint(target, start_time_hint, key_fn)
        } else {
            self.bisect_center(target, key_fn)
        };
        if self.try_exact(center, target, key_fn) {
            return Some(self.0[center]);
        }

        Some(self.interpolate_at_center(center, target, key_fn, interp_key))
    }

    /// Interpolated lookup by slant height (the projection of position onto
    /// the look-angle axis), used when searching for a zero crossing along
    /// the sight line rather than along level ground range.
    pub fn get_at_slant_height(
        &self,
        look_angle_rad: f64,
        target_slant_height: f64,
    ) -> Option<BaseTrajData> {
        if self.0.len() < 3 {
            return None;
        }
        let ca = look_angle_rad.cos();
        let sa = look_angle_rad.sin();
        let key_fn = |row: &BaseTrajData| row.slant_val(ca, sa);

        let center = self.bisect_center(target_slant_height, key_fn);
        if self.try_exact(center, target_slant_height, key_fn) {
            return Some(self.0[center]);
        }

        let p0 = &self.0[center - 1];
        let p1 = &self.0[center];
        let p2 = &self.0[center + 1];
        let (k0, k1, k2) = (key_fn(p0), key_fn(p1), key_fn(p2));
        if k0 == k1 || k1 == k2 || k0 == k2 {
            return Some(self.0[center]);
        }

        let field = |extract: fn(&BaseTrajData) -> f64| {
            interpolate_3pt(target_slant_height, k0, k1, k2, extract(p0), extract(p1), extract(p2))
        };

        Some(BaseTrajData {
            time: field(|r| r.time),
            position: V3::new(
                field(|r| r.position.x),
                field(|r| r.position.y),
                field(|r| r.position.z),
            ),
            velocity: V3::new(
                field(|r| r.velocity.x),
                field(|r| r.velocity.y),
                field(|r| r.velocity.z),
            ),
            mach: field(|r| r.mach),
        })
    }
}

fn get_correction(distance_ft: f64, offset_ft: f64) -> f64 {
    if distance_ft != 0.0 {
        offset_ft.atan2(distance_ft)
    } else {
        0.0
    }
}

fn calculate_energy(weight_gr: f64, velocity_fps: f64) -> f64 {
    weight_gr * velocity_fps * velocity_fps / 450_400.0
}

fn calculate_ogw(weight_gr: f64, velocity_fps: f64) -> f64 {
    weight_gr * weight_gr * velocity_fps * velocity_fps * velocity_fps * 1.5e-12
}

/// Fully derived trajectory sample: everything a caller displaying a
/// ballistic table or searching for a zero/apex actually wants, computed
/// once from a [`BaseTrajData`] row plus the shot geometry that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrajectoryData {
    pub time: f64,
    pub distance_ft: f64,
    pub velocity_fps: f64,
    pub mach: f64,
    pub height_ft: f64,
    pub slant_height_ft: f64,
    pub drop_angle_rad: f64,
    pub windage_ft: f64,
    pub windage_angle_rad: f64,
    pub slant_distance_ft: f64,
    pub angle_rad: f64,
    pub density_ratio: f64,
    pub drag: f64,
    pub energy_ft_lb: f64,
    pub ogw_lb: f64,
    pub flag: TrajFlag,
}

/// Inputs needed to derive a [`TrajectoryData`] row from a raw
/// [`BaseTrajData`] sample, gathered so the constructor doesn't need a
/// dependency on the shot-geometry type that owns them.
pub struct TrajectoryDataInputs {
    pub adjusted_range: V3,
    pub spin_drift_ft: f64,
    pub look_angle_rad: f64,
    pub mach_override: f64,
    pub density_ratio: f64,
    pub local_mach: f64,
    pub drag: f64,
    pub weight_gr: f64,
}

impl TrajectoryData {
    /// Builds a derived row from a raw sample plus everything the shot
    /// geometry contributes (Coriolis-adjusted range, spin drift, drag,
    /// atmosphere lookup at the point). Kept as a free constructor taking
    /// plain inputs rather than a `ShotProps` reference so this type has no
    /// dependency in the other direction.
    pub fn from_base(raw: &BaseTrajData, inputs: &TrajectoryDataInputs, flag: TrajFlag) -> Self {
        let adjusted_range = inputs.adjusted_range;
        let velocity_fps = raw.velocity.magnitude();
        let windage_ft = adjusted_range.z + inputs.spin_drift_ft;

        let trajectory_angle = raw.velocity.y.atan2(raw.velocity.x);
        let look_angle_cos = inputs.look_angle_rad.cos();
        let look_angle_sin = inputs.look_angle_rad.sin();

        let mach = if inputs.mach_override != 0.0 {
            velocity_fps / inputs.mach_override
        } else {
            velocity_fps / inputs.local_mach
        };

        let drop_angle_rad = get_correction(adjusted_range.x, adjusted_range.y)
            - if adjusted_range.x != 0.0 {
                inputs.look_angle_rad
            } else {
                0.0
            };

        TrajectoryData {
            time: raw.time,
            distance_ft: adjusted_range.x,
            velocity_fps,
            mach,
            height_ft: adjusted_range.y,
            slant_height_ft: adjusted_range.y * look_angle_cos - adjusted_range.x * look_angle_sin,
            drop_angle_rad,
            windage_ft,
            windage_angle_rad: get_correction(adjusted_range.x, windage_ft),
            slant_distance_ft: adjusted_range.x * look_angle_cos + adjusted_range.y * look_angle_sin,
            angle_rad: trajectory_angle,
            density_ratio: inputs.density_ratio,
            drag: inputs.drag,
            energy_ft_lb: calculate_energy(inputs.weight_gr, velocity_fps),
            ogw_lb: calculate_ogw(inputs.weight_gr, velocity_fps),
            flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(time: f64, x: f64, y: f64, z: f64, vx: f64, vy: f64, vz: f64, mach: f64) -> BaseTrajData {
        BaseTrajData {
            time,
            position: V3::new(x, y, z),
            velocity: V3::new(vx, vy, vz),
            mach,
        }
    }

    fn sample_seq() -> BaseTrajSeq {
        let mut seq = BaseTrajSeq::new();
        for i in 0..10 {
            let t = i as f64 * 0.1;
            seq.append(row(t, t * 2600.0, 10.0 - t * t, 0.0, 2600.0, -2.0 * t * 10.0, 0.0, 1.1));
        }
        seq
    }

    #[test]
    fn negative_index_counts_from_end() {
        let seq = sample_seq();
        assert_eq!(seq.get_item(-1).unwrap().time, seq.get_item(9).unwrap().time);
        assert_eq!(seq.get_item(-seq.len() as isize).unwrap().time, 0.0);
    }

    #[test]
    fn out_of_bounds_index_is_none() {
        let seq = sample_seq();
        assert!(seq.get_item(100).is_none());
        assert!(seq.get_item(-100).is_none());
    }

    #[test]
    fn get_at_time_recovers_exact_row() {
        let seq = sample_seq();
        let hit = seq.get_at(BaseTrajInterpKey::Time, 0.5, 0.0).unwrap();
        assert!((hit.time - 0.5).abs() < 1e-6);
    }

    #[test]
    fn get_at_time_interpolates_between_rows() {
        let seq = sample_seq();
        let hit = seq.get_at(BaseTrajInterpKey::Time, 0.55, 0.0).unwrap();
        assert!((hit.time - 0.55).abs() < 1e-6);
        assert!(hit.position.x > 0.0);
    }

    #[test]
    fn get_at_with_start_time_hint_matches_cold_lookup() {
        let seq = sample_seq();
        let hinted = seq.get_at(BaseTrajInterpKey::PosX, 650.0, 0.2).unwrap();
        let cold = seq.get_at(BaseTrajInterpKey::PosX, 650.0, 0.0).unwrap();
        assert!((hinted.position.x - cold.position.x).abs() < 1e-6);
        assert!((hinted.time - cold.time).abs() < 1e-9);
    }

    #[test]
    fn get_at_slant_height_finds_descending_row() {
        let seq = sample_seq();
        let hit = seq.get_at_slant_height(0.0, 5.0);
        assert!(hit.is_some());
    }

    #[test]
    fn empty_seq_has_no_lookups() {
        let seq = BaseTrajSeq::new();
        assert!(seq.get_at(BaseTrajInterpKey::Time, 1.0, 0.0).is_none());
        assert!(seq.get_at_slant_height(0.0, 1.0).is_none());
    }

    #[test]
    fn traj_flag_bitwise_ops() {
        let both = TrajFlag::ZERO_UP | TrajFlag::MACH;
        assert!(both.contains(TrajFlag::ZERO_UP));
        assert!(both.contains(TrajFlag::MACH));
        assert!(!both.contains(TrajFlag::APEX));
        assert_eq!(TrajFlag::ZERO.bits(), 3);
    }

    #[test]
    fn trajectory_data_from_base_matches_formulas() {
        let raw = row(1.0, 1000.0, -5.0, 1.0, 2000.0, -50.0, 0.0, 0.0);
        let inputs = TrajectoryDataInputs {
            adjusted_range: raw.position,
            spin_drift_ft: 0.1,
            look_angle_rad: 0.0,
            mach_override: 0.0,
            density_ratio: 1.0,
            local_mach: 1116.45,
            drag: 0.0002,
            weight_gr: 175.0,
        };
        let data = TrajectoryData::from_base(&raw, &inputs, TrajFlag::RANGE);
        assert_eq!(data.distance_ft, 1000.0);
        assert_eq!(data.height_ft, -5.0);
        assert!((data.windage_ft - 1.1).abs() < 1e-9);
        assert!(data.velocity_fps > 0.0);
        assert!(data.energy_ft_lb > 0.0);
    }
}

//! Telemetry field model.
//!
//! Every scalar time series the panel can chart is identified by a
//! [`FieldKind`] plus an axis index (see [`crate::chart::store::ChannelKey`]).
//! The set is closed: field names arriving on the wire that do not parse to a
//! `FieldKind` are skipped, never stored.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Smallest supported arm.
pub const MIN_JOINTS: usize = 3;
/// Largest supported arm.
pub const MAX_JOINTS: usize = 8;

/// Physical unit of one sample lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// rad
    Radians,
    /// rad/s
    RadiansPerSec,
    /// rad/s²
    RadiansPerSec2,
    /// mm
    Millimeters,
    /// mm/s
    MillimetersPerSec,
    /// A
    Amperes,
    /// N·m
    NewtonMeters,
    /// N
    Newtons,
    /// °C
    Celsius,
}

impl Unit {
    /// Whether values in this unit are radian-based and therefore eligible
    /// for degree conversion.
    pub fn is_angular(self) -> bool {
        matches!(
            self,
            Unit::Radians | Unit::RadiansPerSec | Unit::RadiansPerSec2
        )
    }
}

/// One chartable telemetry field, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    /// Planned joint positions.
    #[serde(rename = "target_joint_positions")]
    TargetJointPositions,
    /// Planned joint velocities.
    #[serde(rename = "target_joint_velocities")]
    TargetJointVelocities,
    /// Planned joint accelerations.
    #[serde(rename = "target_joint_accelerations")]
    TargetJointAccelerations,
    /// Measured joint positions.
    #[serde(rename = "actual_joint_positions")]
    ActualJointPositions,
    /// Measured joint velocities.
    #[serde(rename = "actual_joint_velocities")]
    ActualJointVelocities,
    /// Measured joint accelerations.
    #[serde(rename = "actual_joint_accelerations")]
    ActualJointAccelerations,
    /// Measured joint currents.
    #[serde(rename = "actual_joint_currents")]
    ActualJointCurrents,
    /// Joint torque estimated from motor current.
    #[serde(rename = "estimated_joint_torque")]
    EstimatedJointTorque,
    /// Joint temperatures. Carries the frame timestamp marker.
    #[serde(rename = "xarm_joint_temperatures")]
    JointTemperatures,
    /// Planned TCP pose (x/y/z/rx/ry/rz).
    #[serde(rename = "target_tcp_pose")]
    TargetTcpPose,
    /// Planned TCP velocity.
    #[serde(rename = "target_tcp_velocity")]
    TargetTcpVelocity,
    /// Measured TCP pose.
    #[serde(rename = "actual_tcp_pose")]
    ActualTcpPose,
    /// Measured TCP velocity.
    #[serde(rename = "actual_tcp_velocity")]
    ActualTcpVelocity,
    /// TCP force/torque estimated from motor current.
    #[serde(rename = "estimated_tcp_torque")]
    EstimatedTcpTorque,
    /// Force/torque sensor, raw values.
    #[serde(rename = "data_torque_sensor")]
    TorqueSensorRaw,
    /// Force/torque sensor, filtered values.
    #[serde(rename = "filtered_data_torque_sensor")]
    TorqueSensorFiltered,
    /// Target-minus-actual series, derived at snapshot time in analysis
    /// mode. Never written by incoming frames.
    #[serde(rename = "difference_data")]
    Difference,
}

impl FieldKind {
    /// Parses a wire field name.
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }

    /// Stable wire name.
    pub fn wire_name(self) -> &'static str {
        match self {
            FieldKind::TargetJointPositions => "target_joint_positions",
            FieldKind::TargetJointVelocities => "target_joint_velocities",
            FieldKind::TargetJointAccelerations => "target_joint_accelerations",
            FieldKind::ActualJointPositions => "actual_joint_positions",
            FieldKind::ActualJointVelocities => "actual_joint_velocities",
            FieldKind::ActualJointAccelerations => "actual_joint_accelerations",
            FieldKind::ActualJointCurrents => "actual_joint_currents",
            FieldKind::EstimatedJointTorque => "estimated_joint_torque",
            FieldKind::JointTemperatures => "xarm_joint_temperatures",
            FieldKind::TargetTcpPose => "target_tcp_pose",
            FieldKind::TargetTcpVelocity => "target_tcp_velocity",
            FieldKind::ActualTcpPose => "actual_tcp_pose",
            FieldKind::ActualTcpVelocity => "actual_tcp_velocity",
            FieldKind::EstimatedTcpTorque => "estimated_tcp_torque",
            FieldKind::TorqueSensorRaw => "data_torque_sensor",
            FieldKind::TorqueSensorFiltered => "filtered_data_torque_sensor",
            FieldKind::Difference => "difference_data",
        }
    }

    /// Unit of the sample lane at `axis`, or `None` for the derived
    /// difference series (which inherits whatever its sources stored).
    pub fn unit(self, axis: usize) -> Option<Unit> {
        let unit = match self {
            FieldKind::TargetJointPositions | FieldKind::ActualJointPositions => Unit::Radians,
            FieldKind::TargetJointVelocities | FieldKind::ActualJointVelocities => {
                Unit::RadiansPerSec
            }
            FieldKind::TargetJointAccelerations | FieldKind::ActualJointAccelerations => {
                Unit::RadiansPerSec2
            }
            FieldKind::ActualJointCurrents => Unit::Amperes,
            FieldKind::EstimatedJointTorque => Unit::NewtonMeters,
            FieldKind::JointTemperatures => Unit::Celsius,
            FieldKind::TargetTcpPose | FieldKind::ActualTcpPose => {
                if axis < 3 {
                    Unit::Millimeters
                } else {
                    Unit::Radians
                }
            }
            FieldKind::TargetTcpVelocity | FieldKind::ActualTcpVelocity => {
                if axis < 3 {
                    Unit::MillimetersPerSec
                } else {
                    Unit::RadiansPerSec
                }
            }
            FieldKind::EstimatedTcpTorque
            | FieldKind::TorqueSensorRaw
            | FieldKind::TorqueSensorFiltered => {
                if axis < 3 {
                    Unit::Newtons
                } else {
                    Unit::NewtonMeters
                }
            }
            FieldKind::Difference => return None,
        };
        Some(unit)
    }

    /// Whether this field is produced locally rather than by the wire.
    pub fn is_derived(self) -> bool {
        matches!(self, FieldKind::Difference)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Analysis (compare) selections pairing a planned field with its measured
/// counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    /// target vs. actual joint positions
    JointPositions,
    /// target vs. actual joint velocities
    JointVelocities,
    /// target vs. actual joint accelerations
    JointAccelerations,
    /// target vs. actual TCP pose
    TcpPositions,
    /// target vs. actual TCP velocity
    TcpVelocities,
}

impl AnalysisKind {
    /// The (target, actual) source fields feeding this analysis.
    pub fn pair(self) -> (FieldKind, FieldKind) {
        match self {
            AnalysisKind::JointPositions => (
                FieldKind::TargetJointPositions,
                FieldKind::ActualJointPositions,
            ),
            AnalysisKind::JointVelocities => (
                FieldKind::TargetJointVelocities,
                FieldKind::ActualJointVelocities,
            ),
            AnalysisKind::JointAccelerations => (
                FieldKind::TargetJointAccelerations,
                FieldKind::ActualJointAccelerations,
            ),
            AnalysisKind::TcpPositions => (FieldKind::TargetTcpPose, FieldKind::ActualTcpPose),
            AnalysisKind::TcpVelocities => {
                (FieldKind::TargetTcpVelocity, FieldKind::ActualTcpVelocity)
            }
        }
    }

    fn wire_name(self) -> &'static str {
        match self {
            AnalysisKind::JointPositions => "analysis_joint_positions",
            AnalysisKind::JointVelocities => "analysis_joint_velocities",
            AnalysisKind::JointAccelerations => "analysis_joint_accelerations",
            AnalysisKind::TcpPositions => "analysis_tcp_positions",
            AnalysisKind::TcpVelocities => "analysis_tcp_velocities",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "analysis_joint_positions" => Some(AnalysisKind::JointPositions),
            "analysis_joint_velocities" => Some(AnalysisKind::JointVelocities),
            "analysis_joint_accelerations" => Some(AnalysisKind::JointAccelerations),
            "analysis_tcp_positions" => Some(AnalysisKind::TcpPositions),
            "analysis_tcp_velocities" => Some(AnalysisKind::TcpVelocities),
            _ => None,
        }
    }
}

/// What the chart is currently observing: one field, or a target/actual
/// analysis pair with a derived difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveField {
    /// Chart a single telemetry field.
    Single(FieldKind),
    /// Chart a target/actual pair plus their difference.
    Analysis(AnalysisKind),
}

impl ObserveField {
    /// Parses an observation selection as named by the panel
    /// (`target_joint_positions`, `analysis_tcp_positions`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(kind) = AnalysisKind::parse(name) {
            return Some(ObserveField::Analysis(kind));
        }
        FieldKind::parse(name)
            .filter(|f| !f.is_derived())
            .map(ObserveField::Single)
    }

    /// Name as the panel sends it.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ObserveField::Single(f) => f.wire_name(),
            ObserveField::Analysis(a) => a.wire_name(),
        }
    }

    /// Source fields accumulated in the store for this selection.
    pub fn source_fields(&self) -> Vec<FieldKind> {
        match self {
            ObserveField::Single(f) => vec![*f],
            ObserveField::Analysis(a) => {
                let (target, actual) = a.pair();
                vec![target, actual]
            }
        }
    }

    /// Whether a difference series is derived for this selection.
    pub fn is_analysis(&self) -> bool {
        matches!(self, ObserveField::Analysis(_))
    }
}

impl Default for ObserveField {
    fn default() -> Self {
        ObserveField::Single(FieldKind::TargetJointPositions)
    }
}

static ARM_MODEL_JOINTS: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    HashMap::from([
        ("xarm3", 3),
        ("xarm4", 4),
        ("xarm5", 5),
        ("xarm6", 6),
        ("xarm7", 7),
        ("xarm8", 8),
        ("lite6", 6),
        ("lite7", 7),
        ("lite8", 8),
    ])
});

/// Joint count for a known arm model name.
pub fn model_joint_count(model: &str) -> Option<usize> {
    ARM_MODEL_JOINTS.get(model).copied()
}

/// Clamps a joint count into the supported 3..=8 range.
pub fn clamp_joint_count(count: usize) -> usize {
    count.clamp(MIN_JOINTS, MAX_JOINTS)
}

//! Function names accepted in calculator configuration files.

use std::fmt;

use crate::rule::{Function, Signature, Slot};

const COPY: [Slot; 1] = [Slot::Column];
const PAIR: [Slot; 2] = [Slot::Number; 2];
const LANDMARK: [Slot; 3] = [Slot::Label, Slot::Number, Slot::Number];
const AXIS: [Slot; 4] = [Slot::Number; 4];
const AXIS_AND_ONE: [Slot; 5] = [Slot::Number; 5];
const INTERVAL: [Slot; 7] = [Slot::Number; 7];
const TWO_LINES: [Slot; 8] = [Slot::Number; 8];
const INTERVAL_WITH_BASE: [Slot; 12] = [Slot::Number; 12];

/// Functions of `MeasurementConf.json`; results are written to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementFunction {
    /// `length(x1, y1, x2, y2)`: Euclidean distance.
    Length,
    /// `copy(column)`: the value of another column.
    Copy,
    /// `ratio(a, b)`: `a / b`, absent when `b` is zero.
    Ratio,
    /// `parametric_point(x1, y1, x2, y2, t)`: `start + (end - start) * t`,
    /// written to both columns of the target point.
    ParametricPoint,
}

impl MeasurementFunction {
    pub const ALL: [MeasurementFunction; 4] = [
        MeasurementFunction::Length,
        MeasurementFunction::Copy,
        MeasurementFunction::Ratio,
        MeasurementFunction::ParametricPoint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MeasurementFunction::Length => "length",
            MeasurementFunction::Copy => "copy",
            MeasurementFunction::Ratio => "ratio",
            MeasurementFunction::ParametricPoint => "parametric_point",
        }
    }
}

impl Function for MeasurementFunction {
    fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn signature(self) -> Signature {
        match self {
            MeasurementFunction::Length => Signature::exact(&AXIS),
            MeasurementFunction::Copy => Signature::exact(&COPY),
            MeasurementFunction::Ratio => Signature::exact(&PAIR),
            MeasurementFunction::ParametricPoint => Signature::exact(&AXIS_AND_ONE),
        }
    }
}

impl fmt::Display for MeasurementFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Functions of `ReferenceConf.json`; results are drawing instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceFunction {
    /// `(axis[4], reference line[4], offset...)`
    ComputeOffsetReferenceMarkers,
    /// `(axis[4], start, end, step)`
    IntervalReferenceMarkers,
    /// `(axis[4], base line[4], start, end, step, label_offset)`
    IntervalReferenceMarkersWithBaseLength,
    /// `(line[4], offset)`
    DrawRefAlongLine,
    /// `("label", x, y)`
    RenderLandmark,
}

impl ReferenceFunction {
    pub const ALL: [ReferenceFunction; 5] = [
        ReferenceFunction::ComputeOffsetReferenceMarkers,
        ReferenceFunction::IntervalReferenceMarkers,
        ReferenceFunction::IntervalReferenceMarkersWithBaseLength,
        ReferenceFunction::DrawRefAlongLine,
        ReferenceFunction::RenderLandmark,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReferenceFunction::ComputeOffsetReferenceMarkers => "compute_offset_reference_markers",
            ReferenceFunction::IntervalReferenceMarkers => "interval_reference_markers",
            ReferenceFunction::IntervalReferenceMarkersWithBaseLength => {
                "interval_reference_markers_with_base_length"
            }
            ReferenceFunction::DrawRefAlongLine => "draw_ref_along_line",
            ReferenceFunction::RenderLandmark => "render_landmark",
        }
    }

    /// Index of the `step` parameter for the interval functions.
    pub(crate) fn step_index(self) -> Option<usize> {
        match self {
            ReferenceFunction::IntervalReferenceMarkers => Some(6),
            ReferenceFunction::IntervalReferenceMarkersWithBaseLength => Some(10),
            _ => None,
        }
    }
}

impl Function for ReferenceFunction {
    fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn signature(self) -> Signature {
        match self {
            ReferenceFunction::ComputeOffsetReferenceMarkers => Signature {
                fixed: &TWO_LINES,
                repeated: Some(Slot::Number),
            },
            ReferenceFunction::IntervalReferenceMarkers => Signature::exact(&INTERVAL),
            ReferenceFunction::IntervalReferenceMarkersWithBaseLength => {
                Signature::exact(&INTERVAL_WITH_BASE)
            }
            ReferenceFunction::DrawRefAlongLine => Signature::exact(&AXIS_AND_ONE),
            ReferenceFunction::RenderLandmark => Signature::exact(&LANDMARK),
        }
    }
}

impl fmt::Display for ReferenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for function in MeasurementFunction::ALL {
            assert_eq!(MeasurementFunction::parse(function.name()), Some(function));
        }
        for function in ReferenceFunction::ALL {
            assert_eq!(ReferenceFunction::parse(function.name()), Some(function));
        }
        assert_eq!(MeasurementFunction::parse("render_landmark"), None);
    }
}

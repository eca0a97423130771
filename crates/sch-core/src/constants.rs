//! Editor-wide default values

use crate::geometry::Length;

/// Default grid interval for schematic sheets (0.1 inch)
pub const DEFAULT_GRID_INTERVAL: Length = Length::from_nm(2_540_000);

/// Default width of a schematic net line
pub const DEFAULT_NETLINE_WIDTH: Length = Length::from_nm(158_750);

/// Default width of a board trace
pub const DEFAULT_TRACE_WIDTH: Length = Length::from_nm(500_000);

/// Grab radius around a net point for hit-testing
pub const NETPOINT_GRAB_RADIUS: Length = Length::from_nm(600_000);

/// Extra tolerance added to a net line's half-width for hit-testing
pub const NETLINE_GRAB_TOLERANCE: Length = Length::from_nm(300_000);

/// Grab area of a net label: half-width and half-height around its origin
pub const NETLABEL_GRAB_HALF_WIDTH: Length = Length::from_nm(4_000_000);
pub const NETLABEL_GRAB_HALF_HEIGHT: Length = Length::from_nm(1_500_000);

/// Grab radius around a symbol pin for hit-testing
pub const PIN_GRAB_RADIUS: Length = Length::from_nm(600_000);

/// Grab radius around a symbol origin for hit-testing
pub const SYMBOL_GRAB_RADIUS: Length = Length::from_nm(2_500_000);

//! Reserved variable names and SSA versioning.
//!
//! Program variables are spelled with a leading colon (`:x`). Names starting
//! with `:__` are reserved for state introduced during lowering. SSA versions
//! are appended as `#<generation>`.

/// Turtle x-coordinate.
pub const TURTLE_X: &str = ":__turtle_x";
/// Turtle y-coordinate.
pub const TURTLE_Y: &str = ":__turtle_y";
/// Turtle heading, in degrees.
pub const TURTLE_THETA: &str = ":__turtle_theta";
/// Pen state, 0 when down and 1 when up.
pub const TURTLE_PEN: &str = ":__turtle_pen";

pub const COS_THETA: &str = ":__cos_theta";
pub const SIN_THETA: &str = ":__sin_theta";
pub const DELTA_X: &str = ":__delta_x";
pub const DELTA_Y: &str = ":__delta_y";
/// Heading converted to radians.
pub const THETA_RAD: &str = ":__theta_rad";

pub const TEMP_PREFIX: &str = ":__temp_";
pub const BRANCH_PREFIX: &str = ":__branch_";
pub const ASSERT_PREFIX: &str = ":__assert_";
pub const MOVE_PREFIX: &str = ":__move_";
pub const GOTO_X_PREFIX: &str = ":__x_";
pub const GOTO_Y_PREFIX: &str = ":__y_";

/// Separator between a variable and its SSA generation.
pub const SSA_SEPARATOR: char = '#';

/// Name prefixes whose values live in the real domain regardless of the
/// operator defining them.
pub const REAL_PREFIXES: [&str; 7] = [
    TURTLE_X,
    TURTLE_Y,
    DELTA_X,
    DELTA_Y,
    THETA_RAD,
    COS_THETA,
    SIN_THETA,
];

/// Build the SSA name of generation `generation` of `base`.
pub fn ssa_name(base: &str, generation: u32) -> String {
    format!("{base}{SSA_SEPARATOR}{generation}")
}

/// Strip the SSA generation, if any.
pub fn original_name(name: &str) -> &str {
    match name.rsplit_once(SSA_SEPARATOR) {
        Some((base, generation)) if generation.parse::<u32>().is_ok() => base,
        _ => name,
    }
}

/// SSA generation of `name`, or `None` for an unversioned name.
pub fn generation(name: &str) -> Option<u32> {
    name.rsplit_once(SSA_SEPARATOR)
        .and_then(|(_, generation)| generation.parse().ok())
}

/// Whether `name` (versioned or not) is always encoded over the reals.
pub fn is_real_valued(name: &str) -> bool {
    let base = original_name(name);
    REAL_PREFIXES.iter().any(|prefix| base.starts_with(prefix))
}

/// Whether `name` was introduced by lowering rather than written by the user.
pub fn is_reserved(name: &str) -> bool {
    original_name(name).starts_with(":__")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioning_round_trip() {
        let name = ssa_name(":x", 3);
        assert_eq!(name, ":x#3");
        assert_eq!(original_name(&name), ":x");
        assert_eq!(generation(&name), Some(3));
        assert_eq!(generation(":x"), None);
        assert_eq!(original_name(":x"), ":x");
    }

    #[test]
    fn real_domain_prefixes() {
        assert!(is_real_valued(":__turtle_x#2"));
        assert!(is_real_valued(":__cos_theta"));
        assert!(is_real_valued(":__theta_rad@:__turtle_theta#1"));
        assert!(!is_real_valued(":__turtle_theta#0"));
        assert!(!is_real_valued(":__x_0"));
        assert!(!is_real_valued(":x"));
        assert!(is_reserved(":__move_1#0"));
        assert!(!is_reserved(":x#0"));
    }
}

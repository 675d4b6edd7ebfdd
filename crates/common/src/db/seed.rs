//! Starter set of units installed on first use

/// One entry of a seed list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitSeed {
    pub name: &'static str,
    pub code: &'static str,
    pub shortcut: &'static str,
    pub is_default: bool,
}

const fn seed(name: &'static str, code: &'static str, shortcut: &'static str, is_default: bool) -> UnitSeed {
    UnitSeed { name, code, shortcut, is_default }
}

/// Metric length, mass, volume and time units plus pieces (the default)
pub const DEFAULT_UNITS: &[UnitSeed] = &[
    seed("Kilometr", "KM", "km", false),
    seed("Kilogram", "KG", "kg", false),
    seed("Gram", "G", "g", false),
    seed("Litr", "L", "l", false),
    seed("Metr", "M", "m", false),
    seed("Milimetr", "MM", "mm", false),
    seed("Hodiny", "HOD", "hod", false),
    seed("Kusy", "KS", "ks", true),
];

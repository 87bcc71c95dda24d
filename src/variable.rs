use std::fmt;

/// A scalar model variable.
///
/// Values are stored in SI base units. A fixed variable is a specification
/// of the model; an unfixed variable is determined by the solver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Var {
    value: f64,
    fixed: bool,
    lower: Option<f64>,
    upper: Option<f64>,
}

impl Var {
    /// Create an unfixed variable without bounds.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            fixed: false,
            lower: None,
            upper: None,
        }
    }

    /// Set the value and mark the variable as fixed.
    pub fn fix(&mut self, value: f64) {
        self.value = value;
        self.fixed = true;
    }

    /// Release the variable, keeping its current value as initial guess.
    pub fn unfix(&mut self) {
        self.fixed = false;
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Set the lower bound.
    pub fn setlb(&mut self, lower: f64) {
        self.lower = Some(lower);
    }

    /// Set the upper bound.
    pub fn setub(&mut self, upper: f64) {
        self.upper = Some(upper);
    }

    /// Lower and upper bound, unbounded sides as infinities.
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.lower.unwrap_or(f64::NEG_INFINITY),
            self.upper.unwrap_or(f64::INFINITY),
        )
    }

    /// Clamp a value into the bounds of the variable.
    pub fn project(&self, value: f64) -> f64 {
        let (lower, upper) = self.bounds();
        value.max(lower).min(upper)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<f64>| b.map_or("None".to_string(), |b| format!("{b}"));
        write!(
            f,
            "{:>8} : {:>14.8} : {:>8} : {:>5}",
            bound(self.lower),
            self.value,
            bound(self.upper),
            self.fixed
        )
    }
}

/// Specification variables of the flash flowsheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarKey {
    /// Total inlet amount in mol.
    FlowMol,
    /// Inlet temperature in K.
    Temperature,
    /// Inlet pressure in Pa.
    Pressure,
    /// Inlet mole fraction of a component.
    MoleFrac(usize),
    /// Heat added to the unit in J.
    HeatDuty,
    /// Pressure change across the unit in Pa.
    DeltaP,
    /// NRTL non-randomness parameter.
    Alpha(usize, usize),
    /// NRTL binary interaction parameter.
    Tau(usize, usize),
}

impl VarKey {
    /// Readable name of the variable given the component names.
    pub fn name<S: AsRef<str>>(&self, components: &[S]) -> String {
        let c = |i: usize| components.get(i).map_or("?", |s| s.as_ref());
        match *self {
            Self::FlowMol => "inlet.flow_mol".into(),
            Self::Temperature => "inlet.temperature".into(),
            Self::Pressure => "inlet.pressure".into(),
            Self::MoleFrac(i) => format!("inlet.mole_frac_comp[{}]", c(i)),
            Self::HeatDuty => "heat_duty".into(),
            Self::DeltaP => "deltaP".into(),
            Self::Alpha(i, j) => format!("alpha[{},{}]", c(i), c(j)),
            Self::Tau(i, j) => format!("tau[{},{}]", c(i), c(j)),
        }
    }
}

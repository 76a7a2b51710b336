//! Two-input Mamdani controller for vertical motor power.
//!
//! Inputs are the altitude error relative to the origin and the change of
//! altitude since the previous sample. Both are fuzzified with three
//! triangular sets, run through a fixed seven-rule table, and the clipped
//! output sets are defuzzified by centroid over the discretized power
//! universe.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Universe & Membership
// ---------------------------------------------------------------------------

/// Evenly spaced grid a fuzzy variable is defined over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Universe {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Universe {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Number of grid points, both bounds included.
    pub fn num_points(&self) -> usize {
        ((self.max - self.min) / self.step).round() as usize + 1
    }

    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.num_points()).map(move |i| self.min + i as f64 * self.step)
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }
}

/// Triangular membership function with breakpoints `a <= b <= c`.
///
/// Zero outside `(a, c)`, linear up to 1 at `b`, linear back down to `c`.
/// A degenerate edge (`a == b` or `b == c`) gives a vertical shoulder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Triangle {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Triangle {
    pub const fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    #[inline]
    pub fn membership(&self, x: f64) -> f64 {
        if x == self.b {
            1.0
        } else if x > self.a && x < self.b {
            (x - self.a) / (self.b - self.a)
        } else if x > self.b && x < self.c {
            (self.c - x) / (self.c - self.b)
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Linguistic terms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum InputTerm {
    Negative = 0,
    Zero = 1,
    Positive = 2,
}

impl InputTerm {
    pub const ALL: [Self; 3] = [Self::Negative, Self::Zero, Self::Positive];

    pub fn label(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Zero => "zero",
            Self::Positive => "positive",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PowerTerm {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl PowerTerm {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Named axis with its labeled sets, stored in the order of the term's `ALL`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyVariable<T: 'static> {
    pub name: &'static str,
    pub universe: Universe,
    pub terms: [(T, Triangle); 3],
}

impl<T: Copy + PartialEq> FuzzyVariable<T> {
    /// Degree of every term at `x`, in term order.
    pub fn fuzzify(&self, x: f64) -> [f64; 3] {
        self.terms.map(|(_, set)| set.membership(x))
    }

    pub fn membership(&self, term: T, x: f64) -> f64 {
        self.terms
            .iter()
            .find(|(t, _)| *t == term)
            .map_or(0.0, |(_, set)| set.membership(x))
    }
}

pub const ERROR: FuzzyVariable<InputTerm> = FuzzyVariable {
    name: "error",
    universe: Universe::new(-50.0, 50.0, 1.0),
    terms: [
        (InputTerm::Negative, Triangle::new(-50.0, -25.0, 0.0)),
        (InputTerm::Zero, Triangle::new(-5.0, 0.0, 5.0)),
        (InputTerm::Positive, Triangle::new(0.0, 25.0, 50.0)),
    ],
};

pub const DELTA_ERROR: FuzzyVariable<InputTerm> = FuzzyVariable {
    name: "delta_error",
    universe: Universe::new(-10.0, 10.0, 1.0),
    terms: [
        (InputTerm::Negative, Triangle::new(-10.0, -5.0, 0.0)),
        (InputTerm::Zero, Triangle::new(-1.0, 0.0, 1.0)),
        (InputTerm::Positive, Triangle::new(0.0, 5.0, 10.0)),
    ],
};

pub const MOTOR_POWER: FuzzyVariable<PowerTerm> = FuzzyVariable {
    name: "motor_power",
    universe: Universe::new(0.0, 100.0, 1.0),
    terms: [
        (PowerTerm::Low, Triangle::new(0.0, 25.0, 50.0)),
        (PowerTerm::Medium, Triangle::new(25.0, 50.0, 75.0)),
        (PowerTerm::High, Triangle::new(50.0, 75.0, 100.0)),
    ],
};

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// `IF error is .. AND delta_error is .. THEN motor_power is ..`.
///
/// A `None` antecedent places no constraint on that input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub error: Option<InputTerm>,
    pub delta_error: Option<InputTerm>,
    pub power: PowerTerm,
}

impl Rule {
    pub const fn new(
        error: Option<InputTerm>,
        delta_error: Option<InputTerm>,
        power: PowerTerm,
    ) -> Self {
        Self {
            error,
            delta_error,
            power,
        }
    }

    /// Firing strength (AND = min) given the fuzzified inputs.
    pub fn strength(&self, error: &[f64; 3], delta_error: &[f64; 3]) -> f64 {
        let e = self.error.map_or(1.0, |t| error[t.index()]);
        let d = self.delta_error.map_or(1.0, |t| delta_error[t.index()]);
        e.min(d)
    }
}

pub const NUM_RULES: usize = 7;

pub const RULES: [Rule; NUM_RULES] = {
    use InputTerm::{Negative, Positive, Zero};
    use PowerTerm::{High, Low, Medium};
    [
        Rule::new(Some(Negative), Some(Negative), High),
        Rule::new(Some(Negative), Some(Zero), Medium),
        Rule::new(Some(Negative), Some(Positive), Low),
        Rule::new(Some(Zero), None, Medium),
        Rule::new(Some(Positive), Some(Negative), Low),
        Rule::new(Some(Positive), Some(Zero), Medium),
        Rule::new(Some(Positive), Some(Positive), High),
    ]
};

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Everything computed for one controller query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inference {
    /// Error after clamping to its universe.
    pub error: f64,
    /// Delta error after clamping to its universe.
    pub delta_error: f64,
    /// Firing strength per rule, in rule-table order.
    pub firing: [f64; NUM_RULES],
    /// Aggregated (max) strength per output term, in `PowerTerm::ALL` order.
    pub activation: [f64; 3],
    /// `None` when no rule fired, so the output surface has zero area.
    pub centroid: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FuzzyController {
    error: FuzzyVariable<InputTerm>,
    delta_error: FuzzyVariable<InputTerm>,
    motor_power: FuzzyVariable<PowerTerm>,
    rules: &'static [Rule],
    fallback_power: f64,
}

impl Default for FuzzyController {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyController {
    pub fn new() -> Self {
        Self {
            error: ERROR,
            delta_error: DELTA_ERROR,
            motor_power: MOTOR_POWER,
            rules: &RULES,
            fallback_power: MOTOR_POWER.universe.midpoint(),
        }
    }

    /// Power returned when no rule fires.
    pub fn fallback_power(&self) -> f64 {
        self.fallback_power
    }

    /// Crisp motor power in `[0, 100]`.
    ///
    /// Inputs outside their universes are clamped first. At the outer edge
    /// of the error universe every error set is zero, so no rule fires; the
    /// controller then holds `fallback_power` instead of dividing by zero.
    pub fn infer(&self, error: f64, delta_error: f64) -> f64 {
        self.evaluate(error, delta_error)
            .centroid
            .unwrap_or(self.fallback_power)
    }

    /// Full inference pass with intermediate values.
    pub fn evaluate(&self, error: f64, delta_error: f64) -> Inference {
        let error = self.error.universe.clamp(error);
        let delta_error = self.delta_error.universe.clamp(delta_error);

        let e = self.error.fuzzify(error);
        let d = self.delta_error.fuzzify(delta_error);

        let mut firing = [0.0; NUM_RULES];
        let mut activation = [0.0_f64; 3];
        for (slot, rule) in firing.iter_mut().zip(self.rules) {
            let strength = rule.strength(&e, &d);
            *slot = strength;
            let agg = &mut activation[rule.power.index()];
            *agg = agg.max(strength);
        }

        Inference {
            error,
            delta_error,
            firing,
            activation,
            centroid: self.centroid(&activation),
        }
    }

    /// Output surface at `x`: each set clipped at its activation, unioned by max.
    pub fn output_membership(&self, activation: &[f64; 3], x: f64) -> f64 {
        self.motor_power
            .terms
            .iter()
            .zip(activation)
            .map(|((_, set), &level)| set.membership(x).min(level))
            .fold(0.0, f64::max)
    }

    /// `Σ x·μ(x) / Σ μ(x)` over the power grid.
    fn centroid(&self, activation: &[f64; 3]) -> Option<f64> {
        let mut num = 0.0;
        let mut den = 0.0;
        for x in self.motor_power.universe.points() {
            let mu = self.output_membership(activation, x);
            num += x * mu;
            den += mu;
        }

        if den > 0.0 {
            Some(num / den)
        } else {
            None
        }
    }
}

use strum::{EnumIs, EnumIter};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, EnumIs, EnumIter)]
pub enum Sort {
    Bool,
    Int,
    Real,
}

impl Sort {
    pub fn to_str(&self) -> &'static str {
        match self {
            Sort::Bool => "Bool",
            Sort::Int => "Int",
            Sort::Real => "Real",
        }
    }

    /// Whether values of this sort support arithmetic.
    pub fn is_numeric(&self) -> bool {
        !self.is_bool()
    }

    /// Least numeric sort containing both operands.
    pub fn join(self, other: Sort) -> Sort {
        if self.is_real() || other.is_real() {
            Sort::Real
        } else {
            self
        }
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

use serde::{Deserialize, Serialize};

/// A field of a partial update: absent from the payload, or present (possibly `null`
/// when `T` is an `Option`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MaybeAbsent<T> {
    Present(T),
    #[serde(skip_serializing)]
    Absent,
}

impl<T> Default for MaybeAbsent<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> MaybeAbsent<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    pub fn as_ref(&self) -> MaybeAbsent<&T> {
        match self {
            MaybeAbsent::Present(v) => MaybeAbsent::Present(v),
            MaybeAbsent::Absent => MaybeAbsent::Absent,
        }
    }

    /// Returns the present value, or `current` when the field was left out.
    pub fn unwrap_or(self, current: T) -> T {
        match self {
            MaybeAbsent::Present(v) => v,
            MaybeAbsent::Absent => current,
        }
    }
}

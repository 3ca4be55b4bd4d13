use crate::symbols::Type;

/// How a value of one type can become a value of another.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Conversion {
    None,
    Identity,
    Implicit,
    Explicit,
}

impl Conversion {
    pub fn classify(from: Type, to: Type) -> Conversion {
        use Type::*;
        match (from, to) {
            _ if from == to => Conversion::Identity,
            (Void, _) | (_, Void) | (Error, _) | (_, Error) => Conversion::None,
            (_, Any) => Conversion::Implicit,
            (Any, _) => Conversion::Explicit,
            (Bool | Int, String) | (String, Bool | Int) => Conversion::Explicit,
            _ => Conversion::None,
        }
    }

    pub fn exists(self) -> bool {
        self != Conversion::None
    }

    pub fn is_identity(self) -> bool {
        self == Conversion::Identity
    }

    /// Identity conversions are implicit too.
    pub fn is_implicit(self) -> bool {
        matches!(self, Conversion::Identity | Conversion::Implicit)
    }

    pub fn is_explicit(self) -> bool {
        self == Conversion::Explicit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALUE_TYPES: [Type; 3] = [Type::Bool, Type::Int, Type::String];

    #[test]
    fn test_identity() {
        for ty in [Type::Any, Type::Bool, Type::Int, Type::String, Type::Void] {
            let c = Conversion::classify(ty, ty);
            assert_eq!(c, Conversion::Identity);
            assert!(c.exists() && c.is_implicit() && !c.is_explicit());
        }
    }

    #[test]
    fn test_value_type_pairs() {
        for from in VALUE_TYPES {
            for to in VALUE_TYPES {
                let expected = match (from, to) {
                    _ if from == to => Conversion::Identity,
                    (_, Type::String) | (Type::String, _) => Conversion::Explicit,
                    _ => Conversion::None,
                };
                assert_eq!(Conversion::classify(from, to), expected, "{from} -> {to}");
            }
        }
        assert_eq!(
            Conversion::classify(Type::Bool, Type::Int),
            Conversion::None
        );
        assert_eq!(
            Conversion::classify(Type::Int, Type::Bool),
            Conversion::None
        );
    }

    #[test]
    fn test_any() {
        for ty in VALUE_TYPES {
            assert_eq!(Conversion::classify(ty, Type::Any), Conversion::Implicit);
            assert_eq!(Conversion::classify(Type::Any, ty), Conversion::Explicit);
        }
        assert_eq!(Conversion::classify(Type::Void, Type::Any), Conversion::None);
    }
}

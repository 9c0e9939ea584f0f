use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    Ptr,
}

impl Type {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "void" => Some(Self::Void),
            "i1" => Some(Self::I1),
            "i8" => Some(Self::I8),
            "i16" => Some(Self::I16),
            "i32" => Some(Self::I32),
            "i64" => Some(Self::I64),
            "ptr" => Some(Self::Ptr),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::I1 => "i1",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Ptr => "ptr",
        }
    }

    pub fn is_void(&self) -> bool {
        *self == Self::Void
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Function type: return type plus parameter types. Two function symbols can
/// only be linked together when their signatures are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<Type>,
}

impl Signature {
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        Self { ret, params }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn type_names() {
        for t in [Type::Void, Type::I1, Type::I8, Type::I16, Type::I32, Type::I64, Type::Ptr] {
            assert_eq!(Type::parse(t.name()), Some(t));
        }
        assert_eq!(Type::parse("f32"), None);
    }

    #[test]
    fn signature_display() {
        let sig = Signature::new(Type::Ptr, vec![Type::Ptr, Type::I64]);
        assert_eq!(sig.to_string(), "ptr (ptr, i64)");
    }
}

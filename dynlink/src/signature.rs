//! Call signatures: an ordered list of parameter types plus a return type.

use std::fmt;

use crate::types::Type;

/// The static shape of a call: parameter types and return type.
///
/// By convention parameter 0 is the receiver of the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<Type>,
    ret: Type,
}

impl Signature {
    /// Create a signature returning `ret` and taking `params`.
    pub fn new(ret: Type, params: impl Into<Vec<Type>>) -> Self {
        Self {
            params: params.into(),
            ret,
        }
    }

    /// A signature of `arity` `Object` parameters returning `Object`.
    pub fn generic(arity: usize) -> Self {
        Self::new(Type::object(), vec![Type::object(); arity])
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    pub fn param(&self, index: usize) -> &Type {
        &self.params[index]
    }

    pub fn last_param(&self) -> Option<&Type> {
        self.params.last()
    }

    pub fn return_type(&self) -> &Type {
        &self.ret
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn with_return(&self, ret: Type) -> Self {
        Self::new(ret, self.params.clone())
    }

    pub fn with_param(&self, index: usize, ty: Type) -> Self {
        let mut params = self.params.clone();
        params[index] = ty;
        Self::new(self.ret.clone(), params)
    }

    /// Remove `count` parameters starting at `index`.
    pub fn drop_params(&self, index: usize, count: usize) -> Self {
        let mut params = self.params.clone();
        params.drain(index..index + count);
        Self::new(self.ret.clone(), params)
    }

    /// Replace the parameters from `index` onwards with `count` copies of `ty`.
    pub fn spread_tail(&self, index: usize, ty: &Type, count: usize) -> Self {
        let mut params = self.params[..index].to_vec();
        params.extend(std::iter::repeat(ty.clone()).take(count));
        Self::new(self.ret.clone(), params)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.ret)
    }
}

//! Call site descriptors.
//!
//! A descriptor names the operation a call site performs and its static
//! signature. Operation names are colon-separated tokens, for example
//! `dyn:getProp:color`: a scheme, an operator, and optional operands.

use std::fmt;
use std::sync::Arc;

use crate::signature::Signature;

/// Index of the scheme token (`dyn`).
pub const SCHEME: usize = 0;
/// Index of the operator token (`getProp`, `callMethod`, ...).
pub const OPERATOR: usize = 1;
/// Index of the name operand of operations that take one.
pub const NAME_OPERAND: usize = 2;

/// Access context of the code containing the call site. Linkers decide
/// which members each context may see.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Only public members are visible.
    #[default]
    Public,
    /// Members visible to the named scope are visible as well.
    Scoped(Arc<str>),
}

/// The static description of a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSiteDescriptor {
    name: Arc<str>,
    tokens: Vec<Arc<str>>,
    signature: Signature,
    visibility: Visibility,
}

impl CallSiteDescriptor {
    pub fn new(name: &str, signature: Signature) -> Self {
        Self {
            name: Arc::from(name),
            tokens: name.split(':').map(Arc::from).collect(),
            signature,
            visibility: Visibility::Public,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(|t| t.as_ref())
    }

    /// The operator, if the name uses the `dyn` scheme.
    pub fn operator(&self) -> Option<&str> {
        (self.token(SCHEME) == Some("dyn"))
            .then(|| self.token(OPERATOR))
            .flatten()
    }

    pub fn name_operand(&self) -> Option<&str> {
        self.token(NAME_OPERAND)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }
}

impl fmt::Display for CallSiteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

//! Dynamic call-site linking.
//!
//! A call site is an operation (`dyn:getProp:color`, `dyn:callMethod:add`,
//! ...) with a static signature whose target is chosen at runtime. On a
//! miss, the call site asks a chain of pluggable linkers for a guarded
//! invocation: a target plus a guard saying for which arguments the target
//! stays valid. The call site installs the answer and reuses it until its
//! guard fails, at which point it relinks.
//!
//! # Features
//!
//! - Ordered linker chains with receiver-type filtering
//! - Monomorphic and chained relinking policies
//! - Signature adaptation through contributed type converters
//! - Link-time and runtime overload resolution, including variable arity
//! - Switch points for bulk invalidation of bindings
//!
//! # Example
//!
//! ```rust,ignore
//! use dynlink::{CallSiteDescriptor, DynamicLinkerFactory, Signature};
//!
//! let linker = DynamicLinkerFactory::new()
//!     .prioritized_linker(my_linker)
//!     .create_linker();
//! let site = linker.call_site(CallSiteDescriptor::new("dyn:getProp:color", Signature::generic(1)));
//! let color = site.invoke(&[receiver])?;
//! ```

pub mod callsite;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod invocation;
pub mod linker;
pub mod services;
pub mod signature;
pub mod types;
pub mod value;

pub use callsite::CallSite;
pub use config::{ConfigError, LinkerConfig, RelinkPolicy};
pub use convert::{Comparison, ConversionComparator, ConversionRegistry, Convertibility, TypeConverter};
pub use descriptor::{CallSiteDescriptor, Visibility};
pub use dispatch::{DynamicMethod, OverloadedDynamicMethod, SimpleDynamicMethod};
pub use error::{CallError, CallResult, InvokeError, InvokeResult, LinkError, LinkResult};
pub use handle::MethodHandle;
pub use invocation::{Guard, GuardedInvocation, Invocation, RuntimeSelector, SwitchPoint};
pub use linker::{DynamicLinker, DynamicLinkerFactory, GuardingLinker, LinkRequest, LinkerChain};
pub use services::LinkerServices;
pub use signature::Signature;
pub use types::{ClassDef, PrimitiveTy, Type, TypeKind};
pub use value::{HostObject, Value};

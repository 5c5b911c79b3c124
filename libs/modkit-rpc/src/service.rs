//! The service wrapper: per-service dispatch table and the request pipeline.
//!
//! `dispatch` resolves the method, coerces the raw arguments against its signature,
//! invokes the handler and turns every failure into a [`Fault`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use modkit_errors::{Fault, METHOD_NOT_FOUND};
use serde_json::Value;

use crate::arguments::CoercedArguments;
use crate::audit::{AuditLogger, AuditSink, TracingAuditSink};
use crate::classify::classify;
use crate::coerce::ArgumentCoercer;
use crate::config::RpcWrapperConfig;
use crate::descriptor::{MethodSignature, ParameterKind};
use crate::error::RegistrationError;
use crate::fault_builder::FaultBuilder;
use crate::invocation::InvocationError;
use crate::mapper::{DefaultPropertyMapper, PropertyMapper};
use crate::registry::{TypeDescriptorLookup, TypeRegistry};

/// A wrapped service object.
///
/// `underlying_type` is the identifier method signatures are registered under. Proxies
/// and other stand-ins override it to report the implementation they forward to.
pub trait ServiceHandle: Send + Sync + 'static {
    fn underlying_type(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

impl<S: ServiceHandle + ?Sized> ServiceHandle for Arc<S> {
    fn underlying_type(&self) -> Cow<'static, str> {
        (**self).underlying_type()
    }
}

impl<S: ServiceHandle + ?Sized> ServiceHandle for Box<S> {
    fn underlying_type(&self) -> Cow<'static, str> {
        (**self).underlying_type()
    }
}

/// Invokes one method on the service with its coerced arguments.
pub type Handler<S> =
    Box<dyn Fn(&S, CoercedArguments) -> Result<Value, InvocationError> + Send + Sync>;

/// Collects the dispatch table of one service and validates it.
pub struct ServiceWrapperBuilder<S: ServiceHandle> {
    service: Arc<S>,
    registry: Arc<TypeRegistry>,
    methods: Vec<(MethodSignature, Handler<S>)>,
    config: RpcWrapperConfig,
    audit_sink: Option<Arc<dyn AuditSink>>,
    mapper: Arc<dyn PropertyMapper>,
}

impl<S: ServiceHandle> ServiceWrapperBuilder<S> {
    /// Starts a builder with default config, the tracing audit sink and the default mapper.
    #[must_use]
    pub fn new(service: Arc<S>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            service,
            registry,
            methods: Vec::new(),
            config: RpcWrapperConfig::default(),
            audit_sink: Some(Arc::new(TracingAuditSink)),
            mapper: Arc::new(DefaultPropertyMapper),
        }
    }

    /// Adds a remotely callable method.
    #[must_use]
    pub fn method<F>(mut self, signature: MethodSignature, handler: F) -> Self
    where
        F: Fn(&S, CoercedArguments) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        self.methods.push((signature, Box::new(handler)));
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RpcWrapperConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn without_audit_sink(mut self) -> Self {
        self.audit_sink = None;
        self
    }

    #[must_use]
    pub fn with_property_mapper(mut self, mapper: Arc<dyn PropertyMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Registers every signature under the service's underlying type.
    ///
    /// Registration is all or nothing: a rejected build leaves the registry as it was.
    ///
    /// # Errors
    /// Returns the first `RegistrationError`: empty or duplicate method names, or
    /// parameter positions out of order.
    pub fn build(self) -> Result<ServiceWrapper<S>, RegistrationError> {
        let type_id = self.service.underlying_type().into_owned();
        let mut handlers = HashMap::with_capacity(self.methods.len());
        let mut signatures = Vec::with_capacity(self.methods.len());

        for (signature, handler) in self.methods {
            if handlers.contains_key(&signature.name) {
                return Err(RegistrationError::DuplicateMethod {
                    type_id,
                    method: signature.name,
                });
            }
            for parameter in &signature.parameters {
                let target = match &parameter.kind {
                    ParameterKind::Scalar => continue,
                    ParameterKind::Object(ty) | ParameterKind::CollectionOfObject(ty) => ty,
                };
                if !self.registry.is_known_type(target) {
                    tracing::debug!(
                        method = %signature.name,
                        parameter = %parameter.name,
                        target = %target,
                        "parameter type is not registered, raw values pass through"
                    );
                }
            }
            handlers.insert(signature.name.clone(), handler);
            signatures.push(signature);
        }
        self.registry.register_methods(&type_id, signatures)?;

        tracing::info!(service = %type_id, methods = handlers.len(), "service wrapper built");
        let audit = AuditLogger::new(self.audit_sink, &self.config);
        Ok(ServiceWrapper {
            service: self.service,
            registry: self.registry,
            type_id,
            handlers,
            mapper: self.mapper,
            faults: FaultBuilder::new(&self.config, audit),
        })
    }
}

/// Exposes a service's registered methods to a transport.
pub struct ServiceWrapper<S: ServiceHandle> {
    service: Arc<S>,
    registry: Arc<TypeRegistry>,
    type_id: String,
    handlers: HashMap<String, Handler<S>>,
    mapper: Arc<dyn PropertyMapper>,
    faults: FaultBuilder,
}

impl<S: ServiceHandle> ServiceWrapper<S> {
    #[must_use]
    pub fn builder(service: Arc<S>, registry: Arc<TypeRegistry>) -> ServiceWrapperBuilder<S> {
        ServiceWrapperBuilder::new(service, registry)
    }

    /// Type identifier the methods are registered under.
    #[must_use]
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    #[must_use]
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Names of the remotely callable methods, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Calls `method` with the transport's decoded arguments.
    ///
    /// # Errors
    /// Returns a client fault for unknown methods and declared errors, and a server
    /// fault for everything else (mapping failures included).
    pub fn dispatch(&self, method: &str, arguments: Vec<Value>) -> Result<Value, Fault> {
        let span = tracing::debug_span!("rpc.dispatch", service = %self.type_id, method);
        let _enter = span.enter();

        let (Some(handler), Some(signature)) = (
            self.handlers.get(method),
            self.registry.method_signature(&self.type_id, method),
        ) else {
            tracing::debug!("method not found");
            return Err(METHOD_NOT_FOUND.as_fault(method));
        };

        let coercer = ArgumentCoercer::new(
            self.registry.as_ref(),
            self.registry.as_ref(),
            self.mapper.as_ref(),
        );
        // A path instead of the closure would record the caller location inside core.
        #[allow(clippy::redundant_closure)]
        let outcome = coercer
            .coerce(arguments, &signature.parameters)
            .map_err(|e| InvocationError::from_service_error(e))
            .and_then(|args| handler(self.service.as_ref(), args));

        outcome.map_err(|mut error| {
            error.annotate_origin(&self.type_id, method);
            let classified = classify(error, &signature);
            tracing::debug!(
                declared = classified.is_declared(),
                fault_type = classified.error.fault_type(),
                "call failed"
            );
            self.faults.build(classified)
        })
    }
}

impl<S: ServiceHandle> fmt::Debug for ServiceWrapper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWrapper")
            .field("type_id", &self.type_id)
            .field("methods", &self.methods())
            .field("policy", &self.faults.policy())
            .finish_non_exhaustive()
    }
}

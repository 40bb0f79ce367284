//! macOS backend using the SystemExtensions framework
//!
//! Requests are built with `OSSystemExtensionRequest` and handed to
//! `OSSystemExtensionManager.sharedManager`. An Objective-C delegate class
//! forwards the four `OSSystemExtensionRequestDelegate` callbacks to the
//! request's [`RequestDelegate`], converting framework objects into
//! `protocol` types on the way.
//!
//! All callbacks are delivered on one private serial dispatch queue, so
//! they never depend on a main run loop and are never concurrent with each
//! other.
//!
//! The OS holds request delegates weakly. The backend keeps each one in a
//! registry keyed by request id and releases it after the request finishes
//! or fails.

use common::{ExtensionManager, RequestDelegate};
use dispatch2::{DispatchQueue, DispatchQueueAttr, DispatchRetained};
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2::{AllocAnyThread, DefinedClass, define_class, msg_send};
use objc2_foundation::{NSError, NSObject, NSObjectProtocol, NSString};
use objc2_system_extensions::{
    OSSystemExtensionManager, OSSystemExtensionProperties, OSSystemExtensionReplacementAction,
    OSSystemExtensionRequest, OSSystemExtensionRequestDelegate, OSSystemExtensionRequestResult,
};
use protocol::{
    ExtensionProperties, ReplacementAction, RequestFailure, RequestId, RequestKind, RequestResult,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Label of the queue the OS delivers callbacks on
const CALLBACK_QUEUE_LABEL: &str = "id.bulwark.VirtualUSBInstaller.requests";

/// Delegates of requests the OS has not finished yet
type DelegateRegistry = Arc<Mutex<HashMap<RequestId, RetainedDelegate>>>;

/// Instance variables of the Objective-C delegate
struct DelegateIvars {
    delegate: RequestDelegate,
    registry: DelegateRegistry,
    queue: DispatchRetained<DispatchQueue>,
}

impl DelegateIvars {
    /// Drop the registry's retain once the current callback has returned
    fn release(&self) {
        let registry = Arc::clone(&self.registry);
        let id = self.delegate.request().id;
        self.queue.exec_async(move || match registry.lock() {
            Ok(mut delegates) => {
                delegates.remove(&id);
                debug!("Released delegate for request {}", id);
            }
            Err(e) => warn!("Delegate registry poisoned, keeping {}: {}", id, e),
        });
    }
}

define_class!(
    // SAFETY:
    // - NSObject has no subclassing requirements
    // - We don't implement Drop
    #[unsafe(super(NSObject))]
    #[name = "VirtualUSBInstallerRequestDelegate"]
    #[ivars = DelegateIvars]
    struct SystemExtensionDelegate;

    unsafe impl NSObjectProtocol for SystemExtensionDelegate {}

    unsafe impl OSSystemExtensionRequestDelegate for SystemExtensionDelegate {
        #[unsafe(method(request:actionForReplacingExtension:withExtension:))]
        fn action_for_replacing(
            &self,
            _request: &OSSystemExtensionRequest,
            existing: &OSSystemExtensionProperties,
            replacement: &OSSystemExtensionProperties,
        ) -> OSSystemExtensionReplacementAction {
            let action = self.ivars().delegate.replacement_needed(
                convert_properties(existing),
                convert_properties(replacement),
            );
            match action {
                ReplacementAction::Replace => OSSystemExtensionReplacementAction::Replace,
                ReplacementAction::Cancel => OSSystemExtensionReplacementAction::Cancel,
            }
        }

        #[unsafe(method(requestNeedsUserApproval:))]
        fn needs_user_approval(&self, _request: &OSSystemExtensionRequest) {
            self.ivars().delegate.approval_needed();
        }

        #[unsafe(method(request:didFinishWithResult:))]
        fn did_finish(
            &self,
            _request: &OSSystemExtensionRequest,
            result: OSSystemExtensionRequestResult,
        ) {
            self.ivars()
                .delegate
                .finished(RequestResult::from_raw(result.0 as i64));
            self.ivars().release();
        }

        #[unsafe(method(request:didFailWithError:))]
        fn did_fail(&self, _request: &OSSystemExtensionRequest, error: &NSError) {
            self.ivars().delegate.failed(convert_error(error));
            self.ivars().release();
        }
    }
);

impl SystemExtensionDelegate {
    fn new(ivars: DelegateIvars) -> Retained<Self> {
        let this = Self::alloc().set_ivars(ivars);
        // SAFETY: Calling init on a freshly allocated NSObject subclass
        unsafe { msg_send![super(this), init] }
    }
}

/// Wrapper to assert `Send + Sync` for a retained delegate.
///
/// The OS only messages the delegate on the callback queue. Other threads
/// only retain and release it.
struct RetainedDelegate(Retained<SystemExtensionDelegate>);
unsafe impl Send for RetainedDelegate {}
unsafe impl Sync for RetainedDelegate {}

/// `OSSystemExtensionManager` backend
pub struct SystemExtensionManager {
    callback_queue: DispatchRetained<DispatchQueue>,
    /// `OSSystemExtensionRequest.delegate` is weak; keep each delegate
    /// alive until its request finishes or fails
    delegates: DelegateRegistry,
}

// SAFETY: dispatch queues are thread-safe; the delegate registry is behind a mutex.
unsafe impl Send for SystemExtensionManager {}
unsafe impl Sync for SystemExtensionManager {}

impl SystemExtensionManager {
    /// Create the backend and its callback queue
    pub fn new() -> Self {
        let callback_queue = DispatchQueue::new(CALLBACK_QUEUE_LABEL, DispatchQueueAttr::SERIAL);
        Self {
            callback_queue,
            delegates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create the Objective-C delegate for a request and keep it alive
    /// until the request finishes or fails
    fn register(
        &self,
        delegate: RequestDelegate,
    ) -> common::Result<Retained<SystemExtensionDelegate>> {
        let id = delegate.request().id;
        let objc_delegate = SystemExtensionDelegate::new(DelegateIvars {
            delegate,
            registry: Arc::clone(&self.delegates),
            queue: self.callback_queue.clone(),
        });

        self.delegates
            .lock()
            .map_err(|e| common::Error::Submission(format!("delegate registry poisoned: {}", e)))?
            .insert(id, RetainedDelegate(objc_delegate.clone()));

        Ok(objc_delegate)
    }

    /// Number of requests whose delegate is still registered
    fn pending(&self) -> usize {
        self.delegates.lock().map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for SystemExtensionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionManager for SystemExtensionManager {
    fn name(&self) -> &'static str {
        "OSSystemExtensionManager"
    }

    fn submit(&self, delegate: RequestDelegate) -> common::Result<()> {
        let request = delegate.request().clone();
        let identifier = NSString::from_str(request.identifier.as_str());

        let os_request = unsafe {
            match request.kind {
                RequestKind::Activate => {
                    OSSystemExtensionRequest::activationRequestForExtension_queue(
                        &identifier,
                        &self.callback_queue,
                    )
                }
                RequestKind::Deactivate => {
                    OSSystemExtensionRequest::deactivationRequestForExtension_queue(
                        &identifier,
                        &self.callback_queue,
                    )
                }
            }
        };

        let objc_delegate = self.register(delegate)?;
        unsafe {
            os_request.setDelegate(Some(ProtocolObject::from_ref(&*objc_delegate)));
            OSSystemExtensionManager::sharedManager().submitRequest(&os_request);
        }

        info!(
            "Submitted {} to OSSystemExtensionManager ({} pending)",
            request,
            self.pending()
        );
        Ok(())
    }
}

/// Snapshot framework bundle properties
fn convert_properties(properties: &OSSystemExtensionProperties) -> ExtensionProperties {
    let (bundle_identifier, bundle_version, bundle_short_version, path) = unsafe {
        (
            properties.bundleIdentifier(),
            properties.bundleVersion(),
            properties.bundleShortVersion(),
            properties.URL().path(),
        )
    };

    ExtensionProperties {
        bundle_identifier: bundle_identifier.to_string(),
        bundle_version: bundle_version.to_string(),
        bundle_short_version: bundle_short_version.to_string(),
        path: path.map(|p| PathBuf::from(p.to_string())),
    }
}

fn convert_error(error: &NSError) -> RequestFailure {
    RequestFailure::new(
        error.domain().to_string(),
        error.code() as i64,
        error.localizedDescription().to_string(),
    )
}

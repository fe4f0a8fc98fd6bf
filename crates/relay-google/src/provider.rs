// google-native backend
//
// Thin Provider wrapper over the Gemini driver; the multi backend reuses
// the driver directly for google/vertexai routing.

use std::sync::Arc;

use relay_core::clients::ClientCache;
use relay_core::registry::Provider;
use relay_core::request::GenerateRequest;
use relay_core::signatures::SignatureCache;
use relay_core::stream::DeltaStream;

use crate::driver::{GeminiClient, GeminiDriver};

pub struct GoogleNativeProvider {
    driver: GeminiDriver,
}

impl GoogleNativeProvider {
    pub fn new(clients: Arc<ClientCache<GeminiClient>>, signatures: Arc<SignatureCache>) -> Self {
        Self {
            driver: GeminiDriver::new(clients, signatures),
        }
    }

    pub fn with_driver(driver: GeminiDriver) -> Self {
        Self { driver }
    }
}

impl Provider for GoogleNativeProvider {
    fn generate(&self, request: GenerateRequest) -> DeltaStream {
        self.driver.generate(request)
    }
}

pub mod events;
pub mod realtime;

// Re-export commonly used types for convenience
pub use events::{EventDispatcher, RealtimeEvent};

pub use realtime::{
    AudioFormat, ClientConfig, ConnectionState, EventCallback, NoiseReductionType, RealtimeClient,
    RealtimeError, RealtimeResult, SessionConfig, TranscriptionClient, TranscriptionConfig,
    TranscriptionModel, TurnDetection,
};

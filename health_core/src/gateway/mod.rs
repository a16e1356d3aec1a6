pub mod ami;

pub use ami::AmiGatewayClient;

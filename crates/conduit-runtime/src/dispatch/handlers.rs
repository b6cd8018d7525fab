//! Built-in handlers for `request` and `receipt` packets.

use super::actions::HandlerError;
use super::api::{PacketContext, PacketHandler};
use async_trait::async_trait;
use conduit_protocol::{ActionError, ReceiptPacket, ReceiptState, TypedPacket};
use std::time::Duration;
use tracing::{debug, error};

/// Runs the requested action and answers with its receipt.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestPacketHandler;

#[async_trait]
impl PacketHandler for RequestPacketHandler {
    async fn handle(&self, ctx: &PacketContext<'_>) -> Result<(), HandlerError> {
        let TypedPacket::Request(request) = &ctx.packet else {
            return Err(format!("expected request, got '{}'", ctx.packet.packet_type()).into());
        };

        let timeout = match request.timeout_ms {
            0 => ctx.api.handler_timeout(),
            ms => Duration::from_millis(ms),
        };

        let receipt = match ctx.api.actions().invoke(request, timeout).await {
            Ok(receipt) => receipt,
            Err(err) => {
                if let ActionError::InternalActionHandlerError { action, message } = &err {
                    error!(
                        packet = %request.header.id,
                        %action,
                        source = %ctx.peer.subject(),
                        error = %message,
                        "action handler failed"
                    );
                } else {
                    debug!(packet = %request.header.id, error = %err, "request rejected");
                }
                let cause = err.to_cause(ctx.api.language(), ctx.api.subject().clone());
                ReceiptPacket::failure(&request.header, ReceiptState::Failed, cause)
            }
        };

        ctx.reply(receipt).await?;
        Ok(())
    }
}

/// Hands receipts to the connection's pending requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptPacketHandler;

#[async_trait]
impl PacketHandler for ReceiptPacketHandler {
    async fn handle(&self, ctx: &PacketContext<'_>) -> Result<(), HandlerError> {
        let TypedPacket::Receipt(receipt) = &ctx.packet else {
            return Err(format!("expected receipt, got '{}'", ctx.packet.packet_type()).into());
        };
        ctx.peer.resolve_receipt(receipt.clone());
        Ok(())
    }
}

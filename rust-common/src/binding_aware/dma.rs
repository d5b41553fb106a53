use super::{BindingAwareBuilder, CommunicationModel, ConnectionChannel};
use crate::MappingError;

/// Connection driven by a DMA engine: `start -> send -> latency -> end`.
///
/// `start` and `send` handle one token at a time. The source buffer is
/// released as soon as `send` has read a token, the destination buffer
/// space travels back through a zero-time `fake` actor into `start`, and
/// `end` waits for the TDMA slice of the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct DmaCommunication;

impl CommunicationModel for DmaCommunication {
    fn name(&self) -> &str {
        "dma"
    }

    fn model_channel_to_connection(
        &self,
        builder: &mut BindingAwareBuilder,
        cc: &ConnectionChannel,
    ) -> Result<(), MappingError> {
        let c = builder.source.channel(cc.channel).clone();
        let p = builder.source.src_rate(cc.channel);
        let q = builder.source.dst_rate(cc.channel);
        let dst_space = builder.free_space(cc.channel, cc.constraints.buffer.dst)?;
        let (a, b) = (c.src.actor, c.dst.actor);
        let n = &c.name;

        let start = builder.add_synthetic_actor(&format!("{}_start", n), 0, true);
        let send = builder.add_synthetic_actor(
            &format!("{}_send", n),
            cc.token_transfer_time(c.token_size),
            true,
        );
        let latency = builder.add_synthetic_actor(&format!("{}_latency", n), cc.latency, false);
        let end = builder.add_synthetic_actor(&format!("{}_end", n), cc.dst_tdma_wait, false);
        let fake = builder.add_synthetic_actor(&format!("{}_fake", n), 0, false);

        builder.from_port(&format!("{}_src", n), c.src, start, 1, 0);
        builder
            .graph
            .connect(&format!("{}_program", n), start, 1, send, 1, 0);
        builder
            .graph
            .connect(&format!("{}_transfer", n), send, 1, latency, 1, 0);
        builder
            .graph
            .connect(&format!("{}_complete", n), latency, 1, end, 1, 0);
        let arrival = builder.to_port(&format!("{}_dst", n), end, 1, c.dst, c.initial_tokens);
        builder.keep_token_names(cc.channel, arrival);

        builder.graph.connect(
            &format!("{}_src_space", n),
            send,
            1,
            a,
            p,
            cc.constraints.buffer.src,
        );
        builder
            .graph
            .connect(&format!("{}_release", n), b, q, fake, 1, dst_space);
        builder
            .graph
            .connect(&format!("{}_dst_space", n), fake, 1, start, 1, 0);
        Ok(())
    }
}

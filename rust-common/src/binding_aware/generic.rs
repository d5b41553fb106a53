use super::{BindingAwareBuilder, CommunicationModel, ConnectionChannel};
use crate::MappingError;

/// Connection modelled as a pipeline `rate -> latency -> sync` between the
/// endpoints of the channel.
///
/// The rate actor sends one token at a time at the channel bandwidth and
/// first claims space in the destination buffer. The latency actor adds
/// the connection latency, the sync actor the time the destination waits
/// for its TDMA slice. Source buffer space is returned once a token leaves
/// through the rate actor. Initial tokens sit in the destination buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericCommunication;

impl CommunicationModel for GenericCommunication {
    fn name(&self) -> &str {
        "generic"
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

        let rate = builder.add_synthetic_actor(
            &format!("{}_rate", n),
            cc.token_transfer_time(c.token_size),
            true,
        );
        let latency = builder.add_synthetic_actor(&format!("{}_latency", n), cc.latency, false);
        let sync = builder.add_synthetic_actor(&format!("{}_sync", n), cc.dst_tdma_wait, false);

        builder.from_port(&format!("{}_src", n), c.src, rate, 1, 0);
        builder
            .graph
            .connect(&format!("{}_link", n), rate, 1, latency, 1, 0);
        builder
            .graph
            .connect(&format!("{}_deliver", n), latency, 1, sync, 1, 0);
        let arrival = builder.to_port(&format!("{}_dst", n), sync, 1, c.dst, c.initial_tokens);
        builder.keep_token_names(cc.channel, arrival);

        builder.graph.connect(
            &format!("{}_src_space", n),
            rate,
            1,
            a,
            p,
            cc.constraints.buffer.src,
        );
        builder
            .graph
            .connect(&format!("{}_dst_space", n), b, q, rate, 1, dst_space);
        Ok(())
    }
}

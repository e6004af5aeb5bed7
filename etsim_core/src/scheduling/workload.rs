use crate::backend::{CompletionEvent, CompletionToken, SimKernel, Tick};
use crate::communication::{CollectiveRequest, CommunicatorGroup};
use crate::config::EngineConfig;
use crate::core::{DependencyGraph, NodeClass, NodeId, TraceNode};
use crate::error::{EtsimError, EtsimResult};
use crate::scheduling::completion::{
    CollectiveCompletionMap, ExpectedEvent, InFlightArena, InFlightContext,
};
use crate::scheduling::resources::ResourceTracker;
use crate::scheduling::statistics::{OperatorType, Statistics, StatisticsReport};
use crate::scheduling::validation::{plan_dispatch, DispatchPlan};

/// Replays one system's dependency graph against a simulation kernel
///
/// The workload is driven entirely by [`call`](Self::call): a
/// [`CompletionEvent::Wake`] runs a drain, every other event completes one
/// operation and then drains again. After the last node finishes the
/// statistics are post-processed once and all further events are ignored.
///
/// # Example
///
/// ```rust,ignore
/// use etsim_core::prelude::*;
///
/// let graph = TraceGraph::load_for_system("traces/llm", 0)?;
/// let mut workload = Workload::new(EngineConfig::standard(), graph)?;
/// let mut kernel = AnalyticalKernel::new(AnalyticalConfig::default())?;
/// run_to_completion(&mut workload, &mut kernel)?;
/// println!("{:?}", workload.report());
/// ```
#[derive(Debug)]
pub struct Workload<G: DependencyGraph> {
    config: EngineConfig,
    graph: G,
    resources: ResourceTracker,
    in_flight: InFlightArena,
    collectives: CollectiveCompletionMap,
    statistics: Statistics,
    comm_group: Option<CommunicatorGroup>,
    is_finished: bool,
    finish_tick: Option<Tick>,
}

impl<G: DependencyGraph> Workload<G> {
    pub fn new(config: EngineConfig, graph: G) -> EtsimResult<Self> {
        config.validate()?;
        let comm_group = match &config.comm_group_file {
            Some(path) => CommunicatorGroup::from_json_file(path, config.sys_id)?,
            None => None,
        };
        if let Some(group) = &comm_group {
            log::debug!(
                "sys[{}] joins communicator group {} of {} npus",
                config.sys_id,
                group.id,
                group.size()
            );
        }

        Ok(Self {
            resources: ResourceTracker::new(config.resources),
            statistics: Statistics::new(config.sys_id, config.track_memory),
            in_flight: InFlightArena::new(),
            collectives: CollectiveCompletionMap::new(),
            comm_group,
            is_finished: false,
            finish_tick: None,
            config,
            graph,
        })
    }

    /// Replace the communicator group loaded from the configuration
    pub fn with_comm_group(mut self, group: CommunicatorGroup) -> Self {
        self.comm_group = Some(group);
        self
    }

    /// Kick off issuance; same as delivering [`CompletionEvent::Wake`]
    pub fn fire(&mut self, kernel: &mut dyn SimKernel) -> EtsimResult<()> {
        self.call(CompletionEvent::Wake, kernel)
    }

    /// Deliver one completion event
    pub fn call(&mut self, event: CompletionEvent, kernel: &mut dyn SimKernel) -> EtsimResult<()> {
        if self.is_finished {
            return Ok(());
        }

        match event {
            CompletionEvent::Wake => self.issue_dep_free_nodes(kernel)?,
            CompletionEvent::CollectiveFinished(handle) => {
                if let Some((node, class)) = self.collectives.complete(handle) {
                    self.finish_node(node, class, kernel)?;
                }
            }
            CompletionEvent::NodeFinished(token)
            | CompletionEvent::PacketSent(token)
            | CompletionEvent::PacketReceived(token) => {
                let context = self.in_flight.take(token, &event);
                self.finish_node(context.node, context.class, kernel)?;
            }
        }

        self.check_termination(kernel)
    }

    /// Issue every ready node whose resource is free
    ///
    /// Ready nodes that find their resource busy are handed back to the
    /// graph after the drain, in the order they were offered.
    pub fn issue_dep_free_nodes(&mut self, kernel: &mut dyn SimKernel) -> EtsimResult<()> {
        let mut push_back_queue = Vec::new();

        while let Some(id) = self.graph.next_ready_node() {
            let class = self
                .graph
                .lookup(id)
                .map(TraceNode::class)
                .ok_or(EtsimError::UnknownNode(id))?;
            if self.resources.is_available(class) {
                self.issue(id, kernel)?;
            } else {
                push_back_queue.push(id);
            }
        }

        for id in push_back_queue {
            self.graph.push_back_ready(id);
        }
        Ok(())
    }

    fn issue(&mut self, id: NodeId, kernel: &mut dyn SimKernel) -> EtsimResult<()> {
        let node = self
            .graph
            .lookup(id)
            .cloned()
            .ok_or(EtsimError::UnknownNode(id))?;
        let class = node.class();

        let plan = match plan_dispatch(&node, class, &self.graph, &self.config) {
            Ok(plan) => plan,
            Err(e) if !self.config.is_strict() && e.is_node_local() => {
                log::warn!("sys[{}] skipping node {}: {}", self.config.sys_id, id, e);
                DispatchPlan::Skip
            }
            Err(e) => return Err(e),
        };

        let tick = kernel.current_tick();
        self.trace_line("issue", tick, &node);

        if plan == DispatchPlan::Skip {
            return self.skip_invalid(&node, tick);
        }

        self.resources.occupy(id, class);
        self.statistics.record_start(id, OperatorType::from(class), tick);
        self.dispatch(id, class, plan, kernel)
    }

    fn dispatch(
        &mut self,
        id: NodeId,
        class: NodeClass,
        plan: DispatchPlan,
        kernel: &mut dyn SimKernel,
    ) -> EtsimResult<()> {
        match plan {
            DispatchPlan::Replay { duration } => {
                let token = self.register(id, class, ExpectedEvent::NodeFinished);
                kernel.register_timed_completion(token, duration);
            }
            DispatchPlan::Roofline { num_ops, io_size } => {
                let roofline = self.config.roofline.ok_or_else(|| {
                    EtsimError::internal(format!("node {} planned for roofline without a model", id))
                })?;
                let estimate = roofline.estimate(num_ops, io_size);
                self.statistics.record_roofline(id, &estimate);
                let token = self.register(id, class, ExpectedEvent::NodeFinished);
                kernel.register_timed_completion(token, estimate.elapsed);
            }
            DispatchPlan::RemoteMem { size } => {
                let token = self.register(id, class, ExpectedEvent::NodeFinished);
                kernel.issue_remote_mem(size, token);
            }
            DispatchPlan::Collective {
                kind,
                size,
                involved_dims,
                priority,
            } => {
                let handle = kernel.generate_collective(CollectiveRequest {
                    kind,
                    size,
                    involved_dims,
                    group: self.comm_group.clone(),
                    priority,
                });
                self.collectives.insert(handle, id, class);
            }
            DispatchPlan::TimedCollective { duration } => {
                let handle = kernel.register_timed_collective(duration);
                self.collectives.insert(handle, id, class);
            }
            DispatchPlan::Send(request) => {
                let token = self.register(id, class, ExpectedEvent::PacketSent);
                kernel.send(request, token);
            }
            DispatchPlan::Recv(request) => {
                let token = self.register(id, class, ExpectedEvent::PacketReceived);
                kernel.recv(request, token);
            }
            DispatchPlan::Skip => {
                return Err(EtsimError::internal(format!(
                    "node {} dispatched with nothing to simulate",
                    id
                )))
            }
        }
        Ok(())
    }

    fn register(
        &mut self,
        node: NodeId,
        class: NodeClass,
        expected: ExpectedEvent,
    ) -> CompletionToken {
        self.in_flight.insert(InFlightContext {
            node,
            class,
            expected,
        })
    }

    /// Complete a node that carries nothing to simulate
    fn skip_invalid(&mut self, node: &TraceNode, tick: Tick) -> EtsimResult<()> {
        self.statistics
            .record_start(node.id, OperatorType::Invalid, tick);
        self.statistics.record_end(node, tick)?;
        self.graph.free_dependents(node.id);
        self.graph.remove(node.id);
        Ok(())
    }

    fn finish_node(
        &mut self,
        id: NodeId,
        class: NodeClass,
        kernel: &mut dyn SimKernel,
    ) -> EtsimResult<()> {
        let tick = kernel.current_tick();
        let node = self.graph.lookup(id).ok_or(EtsimError::UnknownNode(id))?;
        if self.config.trace_enabled {
            log::debug!(
                "callback,sys->id={}, tick={}, node->id={}, node->name={}, node->type={}",
                self.config.sys_id,
                tick,
                node.id,
                node.name,
                node.class().code()
            );
        }

        match self.statistics.record_end(node, tick) {
            Err(e) if !self.config.is_strict() && e.is_node_local() => {
                log::warn!(
                    "sys[{}] memory activity of node {} not recorded: {}",
                    self.config.sys_id,
                    id,
                    e
                );
            }
            result => result?,
        }

        self.resources.release(id, class);
        self.graph.free_dependents(id);
        self.issue_dep_free_nodes(kernel)?;
        self.graph.remove(id);
        Ok(())
    }

    fn check_termination(&mut self, kernel: &mut dyn SimKernel) -> EtsimResult<()> {
        if self.graph.has_remaining_work() || !self.resources.all_resources_released() {
            return Ok(());
        }

        let tick = kernel.current_tick();
        self.is_finished = true;
        self.finish_tick = Some(tick);
        log::info!("sys[{}] finished, {} cycles", self.config.sys_id, tick);

        self.statistics.post_processing()?;
        self.statistics.report();
        Ok(())
    }

    fn trace_line(&self, what: &str, tick: Tick, node: &TraceNode) {
        if self.config.trace_enabled {
            log::debug!(
                "{},sys->id={}, tick={}, node->id={}, node->name={}, node->type={}",
                what,
                self.config.sys_id,
                tick,
                node.id,
                node.name,
                node.class().code()
            );
        }
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    /// Tick at which the run terminated
    pub fn finish_tick(&self) -> Option<Tick> {
        self.finish_tick
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Final report, available once the workload has finished
    pub fn report(&self) -> Option<&StatisticsReport> {
        self.statistics.summary()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    pub fn comm_group(&self) -> Option<&CommunicatorGroup> {
        self.comm_group.as_ref()
    }

    /// Operations issued to the kernel and not yet completed
    ///
    /// A collective counts once however many kernel handles it spans.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len() + self.collectives.pending_nodes()
    }
}

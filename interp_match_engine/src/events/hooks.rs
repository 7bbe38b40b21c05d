use std::sync::Arc;

use crate::events::{
    AdminEscalationEvent,
    EventHandler,
    EventProducer,
    GroupResolvedEvent,
    Handler,
    OrderAssignedEvent,
    OrderCancelledEvent,
    OrderExpiredEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_assigned_producer: Vec<EventProducer<OrderAssignedEvent>>,
    pub order_expired_producer: Vec<EventProducer<OrderExpiredEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
    pub group_resolved_producer: Vec<EventProducer<GroupResolvedEvent>>,
    pub admin_escalation_producer: Vec<EventProducer<AdminEscalationEvent>>,
}

pub struct EventHandlers {
    pub on_order_assigned: Option<EventHandler<OrderAssignedEvent>>,
    pub on_order_expired: Option<EventHandler<OrderExpiredEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
    pub on_group_resolved: Option<EventHandler<GroupResolvedEvent>>,
    pub on_admin_escalation: Option<EventHandler<AdminEscalationEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_assigned: hooks.on_order_assigned.map(|f| EventHandler::new(buffer_size, f)),
            on_order_expired: hooks.on_order_expired.map(|f| EventHandler::new(buffer_size, f)),
            on_order_cancelled: hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f)),
            on_group_resolved: hooks.on_group_resolved.map(|f| EventHandler::new(buffer_size, f)),
            on_admin_escalation: hooks.on_admin_escalation.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_assigned {
            result.order_assigned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_expired {
            result.order_expired_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_group_resolved {
            result.group_resolved_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_admin_escalation {
            result.admin_escalation_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_assigned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_expired {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_cancelled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_group_resolved {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_admin_escalation {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_assigned: Option<Handler<OrderAssignedEvent>>,
    pub on_order_expired: Option<Handler<OrderExpiredEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
    pub on_group_resolved: Option<Handler<GroupResolvedEvent>>,
    pub on_admin_escalation: Option<Handler<AdminEscalationEvent>>,
}

impl EventHooks {
    pub fn on_order_assigned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAssignedEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_order_assigned = Some(Arc::new(f));
        self
    }

    pub fn on_order_expired<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderExpiredEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_order_expired = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCancelledEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_group_resolved<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(GroupResolvedEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_group_resolved = Some(Arc::new(f));
        self
    }

    pub fn on_admin_escalation<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AdminEscalationEvent) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_admin_escalation = Some(Arc::new(f));
        self
    }
}

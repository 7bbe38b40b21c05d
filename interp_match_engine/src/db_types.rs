use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use ims_common::Rating;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::timeframe::TimeFrame;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        GroupId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct GroupId(pub String);

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "G#{}", self.0)
    }
}

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     InterpreterId      ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, PartialOrd, Ord)]
#[sqlx(transparent)]
pub struct InterpreterId(pub i64);

impl From<i64> for InterpreterId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for InterpreterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "I#{}", self.0)
    }
}

impl InterpreterId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order is open and invitation waves are running.
    Searching,
    /// An interpreter accepted the order (and, for grouped orders, the whole group).
    Assigned,
    /// The underlying appointment was cancelled before an interpreter was found.
    Cancelled,
    /// The search window closed without any interpreter accepting.
    Expired,
}

impl OrderStatusType {
    /// Once an order is terminal, no further waves run for it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Searching)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Searching => write!(f, "Searching"),
            OrderStatusType::Assigned => write!(f, "Assigned"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Expired => write!(f, "Expired"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Searching");
            OrderStatusType::Searching
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Searching" => Ok(Self::Searching),
            "Assigned" => Ok(Self::Assigned),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    SchedulingType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SchedulingType {
    /// The client needs an interpreter right now. Short, aggressive search cadence.
    OnDemand,
    /// The appointment is booked for a future date. Longer cadence and search window.
    PreBooked,
}

impl Display for SchedulingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingType::OnDemand => write!(f, "OnDemand"),
            SchedulingType::PreBooked => write!(f, "PreBooked"),
        }
    }
}

impl FromStr for SchedulingType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OnDemand" => Ok(Self::OnDemand),
            "PreBooked" => Ok(Self::PreBooked),
            s => Err(ConversionError(format!("Invalid scheduling type: {s}"))),
        }
    }
}

//--------------------------------------  CommunicationType    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommunicationType {
    Video,
    Phone,
    OnSite,
}

impl Display for CommunicationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunicationType::Video => write!(f, "Video"),
            CommunicationType::Phone => write!(f, "Phone"),
            CommunicationType::OnSite => write!(f, "OnSite"),
        }
    }
}

impl FromStr for CommunicationType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Video" => Ok(Self::Video),
            "Phone" => Ok(Self::Phone),
            "OnSite" => Ok(Self::OnSite),
            s => Err(ConversionError(format!("Invalid communication type: {s}"))),
        }
    }
}

//--------------------------------------   InterpretingType    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum InterpretingType {
    Consecutive,
    Simultaneous,
}

impl Display for InterpretingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpretingType::Consecutive => write!(f, "Consecutive"),
            InterpretingType::Simultaneous => write!(f, "Simultaneous"),
        }
    }
}

impl FromStr for InterpretingType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Consecutive" => Ok(Self::Consecutive),
            "Simultaneous" => Ok(Self::Simultaneous),
            s => Err(ConversionError(format!("Invalid interpreting type: {s}"))),
        }
    }
}

//--------------------------------------   CandidateOutcome    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CandidateOutcome {
    /// The interpreter never responded inside the wave window. May be invited again in a later wave.
    Ignored,
    /// The interpreter explicitly rejected the order. Excluded from every later wave for this order.
    Declined,
}

impl Display for CandidateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateOutcome::Ignored => write!(f, "Ignored"),
            CandidateOutcome::Declined => write!(f, "Declined"),
        }
    }
}

impl FromStr for CandidateOutcome {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ignored" => Ok(Self::Ignored),
            "Declined" => Ok(Self::Declined),
            s => Err(ConversionError(format!("Invalid candidate outcome: {s}"))),
        }
    }
}

//--------------------------------------    RepeatInterval     -------------------------------------------------------
/// The wave cadence for an order. One wave stays open for exactly one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RepeatInterval {
    OneMinute,
    TwoMinutes,
    FiveMinutes,
    FifteenMinutes,
}

impl RepeatInterval {
    pub fn duration(&self) -> Duration {
        match self {
            RepeatInterval::OneMinute => Duration::minutes(1),
            RepeatInterval::TwoMinutes => Duration::minutes(2),
            RepeatInterval::FiveMinutes => Duration::minutes(5),
            RepeatInterval::FifteenMinutes => Duration::minutes(15),
        }
    }
}

impl Display for RepeatInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatInterval::OneMinute => write!(f, "OneMinute"),
            RepeatInterval::TwoMinutes => write!(f, "TwoMinutes"),
            RepeatInterval::FiveMinutes => write!(f, "FiveMinutes"),
            RepeatInterval::FifteenMinutes => write!(f, "FifteenMinutes"),
        }
    }
}

impl FromStr for RepeatInterval {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OneMinute" => Ok(Self::OneMinute),
            "TwoMinutes" => Ok(Self::TwoMinutes),
            "FiveMinutes" => Ok(Self::FiveMinutes),
            "FifteenMinutes" => Ok(Self::FifteenMinutes),
            s => Err(ConversionError(format!("Invalid repeat interval: {s}"))),
        }
    }
}

//--------------------------------------        Order          -------------------------------------------------------
/// One open search for a single appointment segment. Exactly one non-terminal order exists per open segment.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub appointment_id: String,
    pub customer_id: String,
    pub company_id: String,
    pub group_id: Option<GroupId>,
    pub scheduling_type: SchedulingType,
    pub communication_type: CommunicationType,
    pub interpreting_type: InterpretingType,
    pub topic: String,
    pub lang_from: String,
    pub lang_to: String,
    /// Start of the appointment segment. Used for interpreter availability overlap checks.
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: OrderStatusType,
    pub assigned_interpreter: Option<InterpreterId>,
    /// The wave counter. 0 means no wave has been dispatched yet.
    pub current_wave: i64,
    pub wave_started_at: Option<DateTime<Utc>>,
    pub next_repeat_at: Option<DateTime<Utc>>,
    pub repeat_interval: RepeatInterval,
    pub remaining_repeats: i64,
    pub notify_admin_at: DateTime<Utc>,
    pub end_search_at: DateTime<Utc>,
    /// Escalation latch. Set exactly once, when the admin deadline passes with the order unresolved.
    pub admin_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn admin_notified(&self) -> bool {
        self.admin_notified_at.is_some()
    }

    /// The wave clock state embedded in this record.
    pub fn time_frame(&self) -> TimeFrame {
        TimeFrame {
            next_repeat_at: self.next_repeat_at,
            repeat_interval: self.repeat_interval,
            remaining_repeats: u32::try_from(self.remaining_repeats).unwrap_or(0),
            notify_admin_at: self.notify_admin_at,
            end_search_at: self.end_search_at,
        }
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The order id as assigned by the booking service
    pub order_id: OrderId,
    /// The appointment segment this search belongs to
    pub appointment_id: String,
    /// The requesting client
    pub customer_id: String,
    /// The client's company, used for first-pass candidate scoping and blacklists
    pub company_id: String,
    pub group_id: Option<GroupId>,
    pub scheduling_type: SchedulingType,
    pub communication_type: CommunicationType,
    pub interpreting_type: InterpretingType,
    pub topic: String,
    pub lang_from: String,
    pub lang_to: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S1, S2, S3, S4>(order_id: OrderId, appointment_id: S1, customer_id: S2, lang_from: S3, lang_to: S4) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        let customer_id = customer_id.into();
        let now = Utc::now();
        Self {
            order_id,
            appointment_id: appointment_id.into(),
            company_id: customer_id.clone(),
            customer_id,
            group_id: None,
            scheduling_type: SchedulingType::OnDemand,
            communication_type: CommunicationType::Video,
            interpreting_type: InterpretingType::Consecutive,
            topic: "general".to_string(),
            lang_from: lang_from.into(),
            lang_to: lang_to.into(),
            starts_at: now + Duration::hours(1),
            ends_at: now + Duration::hours(2),
        }
    }

    pub fn for_company<S: Into<String>>(mut self, company_id: S) -> Self {
        self.company_id = company_id.into();
        self
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_scheduling(mut self, scheduling_type: SchedulingType) -> Self {
        self.scheduling_type = scheduling_type;
        self
    }

    pub fn with_communication(mut self, communication_type: CommunicationType) -> Self {
        self.communication_type = communication_type;
        self
    }

    pub fn with_interpreting(mut self, interpreting_type: InterpretingType) -> Self {
        self.interpreting_type = interpreting_type;
        self
    }

    pub fn with_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_window(mut self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }
}

//--------------------------------------      OrderGroup       -------------------------------------------------------
/// A set of orders that must resolve together, e.g. a multi-day booking with a single interpreter across all days.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderGroup {
    pub id: i64,
    pub group_id: GroupId,
    pub same_interpreter: bool,
    pub resolved_interpreter: Option<InterpreterId>,
    pub is_rejected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderGroup {
    pub fn is_resolved(&self) -> bool {
        self.resolved_interpreter.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderGroup {
    pub group_id: GroupId,
    pub same_interpreter: bool,
}

impl NewOrderGroup {
    pub fn new(group_id: GroupId, same_interpreter: bool) -> Self {
        Self { group_id, same_interpreter }
    }
}

//--------------------------------------  InterpreterCandidate -------------------------------------------------------
/// An interpreter eligible to be offered an order, as returned by the candidate query.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InterpreterCandidate {
    pub id: InterpreterId,
    pub display_name: String,
    pub active: bool,
    pub rating: Rating,
    /// Tie-break priorities, ascending. Lower sorts first.
    pub comm_priority: i64,
    pub interp_priority: i64,
    pub sched_priority: i64,
    pub company_id: Option<String>,
    pub registered_at: DateTime<Utc>,
}

//--------------------------------------    NewInterpreter     -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewInterpreter {
    pub display_name: String,
    pub rating: Rating,
    pub comm_priority: i64,
    pub interp_priority: i64,
    pub sched_priority: i64,
    pub company_id: Option<String>,
    pub languages: Vec<(String, String)>,
    pub topics: Vec<String>,
    pub channels: Vec<CommunicationType>,
}

impl NewInterpreter {
    pub fn new<S: Into<String>>(display_name: S, rating: Rating) -> Self {
        Self {
            display_name: display_name.into(),
            rating,
            comm_priority: 0,
            interp_priority: 0,
            sched_priority: 0,
            company_id: None,
            languages: Vec::new(),
            topics: vec!["general".to_string()],
            channels: vec![CommunicationType::Video],
        }
    }

    pub fn with_language<S1: Into<String>, S2: Into<String>>(mut self, from: S1, to: S2) -> Self {
        self.languages.push((from.into(), to.into()));
        self
    }

    pub fn with_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.topics.push(topic.into());
        self
    }

    pub fn with_channel(mut self, channel: CommunicationType) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_priorities(mut self, comm: i64, interp: i64, sched: i64) -> Self {
        self.comm_priority = comm;
        self.interp_priority = interp;
        self.sched_priority = sched;
        self
    }

    pub fn employed_by<S: Into<String>>(mut self, company_id: S) -> Self {
        self.company_id = Some(company_id.into());
        self
    }
}

//--------------------------------------    OutcomeRecord      -------------------------------------------------------
/// Per (order, interpreter) record of how an invitation ended.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub interpreter_id: InterpreterId,
    pub outcome: CandidateOutcome,
    pub wave: i64,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     InviteRecord      -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InviteRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub interpreter_id: InterpreterId,
    pub wave: i64,
    pub sent_at: DateTime<Utc>,
}

//! Nodes and hosts: pods (VM hosts), devices, machines and controllers.
//!
//! Long-running node operations are tracked per item through status flags,
//! so one machine deploying does not block actions on the others.

use entity_sync_core::collection::Collection;
use entity_sync_core::envelope::{Envelope, EnvelopeBuilder};
use entity_sync_core::error::EnvelopeError;
use entity_sync_macros::Entity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// VM host
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(
    active,
    status(compose = "composing", delete = "deleting", refresh = "refreshing"),
    lookup(operation = "getProjects", table = "projects", key = "power_address"),
    lookup(operation = "pollLxdServer", table = "projects", key = "power_address")
)]
pub struct Pod {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Host name
    pub name: String,
    /// Host type (`lxd`, `virsh`)
    #[serde(rename = "type")]
    pub pod_type: String,
    /// Zone the host lives in
    pub zone: Option<u32>,
    /// Resource pool machines are composed into
    pub pool: Option<u32>,
}

/// Project on an LXD server, as listed by `pod.get_projects`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodProject {
    /// Project name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Remote method listing an LXD server's projects
const GET_PROJECTS: &str = "get_projects";

/// Table the project lists are stored in, keyed by power address
const PROJECTS: &str = "projects";

impl Pod {
    /// Compose a machine on this host (`pod.compose`)
    ///
    /// # Errors
    ///
    /// [`EnvelopeError`] if `params` is not an object carrying `id`.
    pub fn compose(params: Value) -> Result<Envelope, EnvelopeError> {
        EnvelopeBuilder::<Self>::new().try_custom_item("compose", params)
    }

    /// Refresh the host's resources (`pod.refresh`)
    #[must_use]
    pub fn refresh(id: u32) -> Envelope {
        EnvelopeBuilder::<Self>::new().custom_item("refresh", json!({ "id": id }))
    }

    /// List the projects of the LXD server at `power_address` (`pod.get_projects`)
    #[must_use]
    pub fn get_projects(mut params: Map<String, Value>) -> Envelope {
        params.insert("type".to_string(), json!("lxd"));
        EnvelopeBuilder::<Self>::new().custom_method("getProjects", GET_PROJECTS, Some(Value::Object(params)))
    }

    /// Keep listing an LXD server's projects until told to stop.
    ///
    /// Errors do not stop the poll; they usually mean the user has not
    /// authenticated yet.
    #[must_use]
    pub fn poll_lxd_server(mut params: Map<String, Value>) -> Envelope {
        params.insert("type".to_string(), json!("lxd"));
        EnvelopeBuilder::<Self>::new()
            .custom_method("pollLxdServer", GET_PROJECTS, Some(Value::Object(params)))
            .polling()
    }

    /// Stop polling the LXD server
    #[must_use]
    pub fn stop_polling_lxd_server() -> Envelope {
        EnvelopeBuilder::<Self>::new().poll_stop("pollLxdServer", GET_PROJECTS)
    }

    /// Projects last listed for the server at `power_address`.
    ///
    /// `None` until a listing succeeded, or if the server answered with
    /// something other than a project list.
    #[must_use]
    pub fn projects(pods: &Collection<Self>, power_address: &str) -> Option<Vec<PodProject>> {
        let listed = pods.lookup(PROJECTS, power_address)?;
        serde_json::from_value(listed.clone()).ok()
    }
}

/// Non-deployable device registered for IP management
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(active, event_errors, status(delete = "deleting", createInterface = "creatingInterface"))]
pub struct Device {
    /// Primary key
    #[primary_key]
    pub system_id: String,
    /// Host name
    pub hostname: String,
    /// Fully qualified domain name
    #[serde(default)]
    pub fqdn: String,
    /// Primary MAC address
    pub primary_mac: Option<String>,
}

/// Deployable machine
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(
    active,
    event_errors,
    status(
        abort = "aborting",
        checkPower = "checkingPower",
        commission = "commissioning",
        delete = "deleting",
        deploy = "deploying",
        release = "releasing"
    )
)]
pub struct Machine {
    /// Primary key
    #[primary_key]
    pub system_id: String,
    /// Host name
    pub hostname: String,
    /// Lifecycle status as reported by the backend
    #[serde(default)]
    pub status: String,
    /// Power state (`on`, `off`, `unknown`)
    #[serde(default)]
    pub power_state: String,
    /// Zone the machine lives in
    pub zone: Option<u32>,
    /// Resource pool the machine belongs to
    pub pool: Option<u32>,
}

impl Machine {
    /// Query the BMC for the current power state (`machine.check_power`)
    #[must_use]
    pub fn check_power(system_id: &str) -> Envelope {
        EnvelopeBuilder::<Self>::new().custom_item("checkPower", json!({ "system_id": system_id }))
    }

    /// Run a node action through `machine.action`.
    ///
    /// Events are named after the action (`machine/deployStart`), which is
    /// what ties them to the action's status flag.
    #[must_use]
    pub fn action(action: &str, system_id: &str, extra: Value) -> Envelope {
        node_action::<Self>(action, system_id, extra)
    }
}

/// Rack or region controller
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[entity(active, event_errors, status(delete = "deleting", importImages = "importingImages"))]
pub struct Controller {
    /// Primary key
    #[primary_key]
    pub system_id: String,
    /// Host name
    pub hostname: String,
    /// Controller role (`rack`, `region`, `region+rack`)
    #[serde(default)]
    pub node_type_display: String,
    /// Running software version
    pub version: Option<String>,
}

impl Controller {
    /// Run a node action through `controller.action`
    #[must_use]
    pub fn action(action: &str, system_id: &str, extra: Value) -> Envelope {
        node_action::<Self>(action, system_id, extra)
    }
}

fn node_action<E: entity_sync_core::entity::Entity>(action: &str, system_id: &str, extra: Value) -> Envelope {
    let params = json!({
        "action": action,
        "extra": extra,
        "system_id": system_id,
    });
    EnvelopeBuilder::<E>::new().custom_method(action, "action", Some(params))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use entity_sync_core::prelude::*;
    use entity_sync_testing::ReducerTest;

    fn machine(system_id: &str) -> Machine {
        Machine {
            system_id: system_id.to_string(),
            hostname: format!("{system_id}-host"),
            status: "Ready".to_string(),
            power_state: "off".to_string(),
            zone: None,
            pool: None,
        }
    }

    #[test]
    fn test_pod_envelopes() {
        let compose = Pod::compose(json!({"id": 3, "cores": 2})).unwrap();
        assert_eq!(compose.endpoint(), "pod.compose");

        assert!(matches!(
            Pod::compose(json!({"cores": 2})),
            Err(EnvelopeError::MissingPrimaryKey { .. })
        ));

        let refresh = Pod::refresh(3);
        assert_eq!(refresh.endpoint(), "pod.refresh");
        assert_eq!(refresh.params, Some(json!({"id": 3})));
    }

    fn lxd_params(address: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("power_address".to_string(), json!(address));
        params
    }

    #[test]
    fn test_lxd_poll_uses_get_projects() {
        let poll = Pod::poll_lxd_server(lxd_params("192.168.1.1"));
        assert!(poll.poll);
        assert_eq!(poll.endpoint(), "pod.get_projects");
        assert_eq!(
            poll.params,
            Some(json!({"power_address": "192.168.1.1", "type": "lxd"}))
        );

        let stop = Pod::stop_polling_lxd_server();
        assert!(stop.poll_stop);
        assert_eq!(stop.endpoint(), poll.endpoint());

        let once = Pod::get_projects(lxd_params("192.168.1.1"));
        assert!(!once.poll);
        assert_eq!(once.endpoint(), "pod.get_projects");
        assert_eq!(once.operation, Operation::custom("getProjects"));
    }

    #[test]
    fn test_projects_stored_per_address() {
        let reducer = CollectionReducer::<Pod>::new();
        let mut pods: Collection<Pod> = Collection::new();
        pods.saving = true;

        for (address, listed) in [
            ("10.0.0.2", json!([{"name": "default"}, {"name": "web", "description": "frontends"}])),
            ("10.0.0.3", json!([{"name": "default"}])),
        ] {
            let envelope = Pod::poll_lxd_server(lxd_params(address));
            for event in [InboundEvent::start(&envelope), InboundEvent::success(&envelope, listed)] {
                let _ = reducer.reduce(&mut pods, event.decode::<Pod>().unwrap(), &());
            }
        }

        assert!(pods.saving);
        assert!(!pods.saved);
        assert!(pods.items.is_empty());
        assert_eq!(
            Pod::projects(&pods, "10.0.0.2").unwrap(),
            vec![
                PodProject {
                    name: "default".to_string(),
                    description: String::new(),
                },
                PodProject {
                    name: "web".to_string(),
                    description: "frontends".to_string(),
                },
            ]
        );
        assert_eq!(Pod::projects(&pods, "10.0.0.3").map(|projects| projects.len()), Some(1));
        assert_eq!(Pod::projects(&pods, "10.0.0.4"), None);
    }

    #[test]
    fn test_machine_action_envelope() {
        let deploy = Machine::action("deploy", "abc123", json!({"osystem": "ubuntu"}));
        assert_eq!(deploy.endpoint(), "machine.action");
        assert_eq!(deploy.operation, Operation::custom("deploy"));
        assert_eq!(InboundEvent::start(&deploy).event_type, "machine/deployStart");

        assert_eq!(Machine::check_power("abc123").endpoint(), "machine.check_power");
        assert_eq!(Controller::action("delete", "ctl1", Value::Null).endpoint(), "controller.action");
    }

    #[test]
    fn test_deploy_raises_only_its_flag() {
        ReducerTest::new(CollectionReducer::<Machine>::new())
            .with_env(())
            .given_state(Collection::with_items(vec![machine("abc123"), machine("def456")]))
            .when_action(CollectionAction::start(Operation::custom("deploy"), Some("abc123".to_string())))
            .then_state(|machines| {
                assert!(machines.is_busy(&"abc123".to_string()));
                assert!(!machines.is_busy(&"def456".to_string()));
                assert_eq!(
                    machines.status(&"abc123".to_string()).and_then(|flags| flags.get("deploying")),
                    Some(&true)
                );
                assert!(!machines.saving);
            })
            .then_effects(|effects| assert!(effects.is_empty()))
            .run();
    }

    #[test]
    fn test_power_check_failure_recorded_per_machine() {
        let reducer = CollectionReducer::<Machine>::new();
        let mut machines = Collection::with_items(vec![machine("abc123")]);
        let key = "abc123".to_string();

        let _ = reducer.reduce(&mut machines, CollectionAction::start(Operation::custom("checkPower"), Some(key.clone())), &());
        let _ = reducer.reduce(
            &mut machines,
            CollectionAction::error(Operation::custom("checkPower"), Some(key.clone()), "BMC unreachable"),
            &(),
        );

        assert!(!machines.is_busy(&key));
        let recorded: Vec<_> = machines.errors_for(&key).collect();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].event, "checkPower");
        assert_eq!(recorded[0].error, SyncError::message("BMC unreachable"));
    }
}

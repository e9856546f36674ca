//! Built-in handlers (§4.G summary table). Each takes the peer, the
//! controller, and a mutable parameter list-as-stack, and returns a
//! `Status` — `Continue` means "not handled here, fall through to the
//! application handler".

use mom_protocol::{ParamList, Status};

use crate::config_map::{self, ConfigValue};
use crate::controller::ControllerInner;
use crate::peer::{Peer, PortStatus};
use std::cell::RefCell;
use std::rc::Rc;

pub type BuiltinHandler = fn(&Rc<RefCell<Peer>>, &Rc<RefCell<ControllerInner>>, &mut ParamList) -> Status;

pub fn alive_request(_peer: &Rc<RefCell<Peer>>, _controller: &Rc<RefCell<ControllerInner>>, _params: &mut ParamList) -> Status {
    Status::Success
}

pub fn get_device_id(_peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    let options = controller.borrow().options.clone();
    let options = options.borrow();
    params.prepend(options.get_str(config_map::DEVICE_NAME));
    params.prepend(options.get_int(config_map::DEVICE_ID));
    Status::Success
}

pub fn set_device_id(_peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    let Some(device_id) = params.get(0).and_then(|p| p.as_int()) else {
        return Status::InvalidParameter;
    };
    if device_id < 1 {
        return Status::InvalidParameter;
    }
    let Some(device_name) = params.get(1).and_then(|p| p.as_str()).map(str::to_owned) else {
        return Status::InvalidParameter;
    };
    let options = controller.borrow().options.clone();
    let mut options = options.borrow_mut();
    options.set(config_map::DEVICE_ID, ConfigValue::Int(device_id));
    options.set(config_map::DEVICE_NAME, ConfigValue::Str(device_name));
    Status::Continue
}

pub fn get_hardware_config(_peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    match params.get(0).and_then(|p| p.as_int()) {
        Some(2) => {}
        _ => return Status::InvalidParameter,
    }
    let options = controller.borrow().options.clone();
    let options = options.borrow();
    params.insert(1, options.get_str(config_map::SERIAL_NUMBER));
    params.insert(1, 1);
    params.insert(1, options.get_str(config_map::SYSTEM_TYPE_AND_VERSION));
    Status::Success
}

pub fn get_software_version(_peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    match params.get(0).and_then(|p| p.as_int()) {
        Some(2) => {}
        _ => return Status::InvalidParameter,
    }
    let options = controller.borrow().options.clone();
    let options = options.borrow();
    params.insert(1, options.get_str(config_map::RECOVERY_FIRMWARE_VERSION));
    params.insert(1, options.get_str(config_map::RECOVERY_FIRMWARE_TAG));
    params.insert(1, options.get_str(config_map::CPU_FIRMWARE_VERSION));
    params.insert(1, options.get_str(config_map::CPU_FIRMWARE_TAG));
    Status::Success
}

pub fn get_device_info(_peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    let options = controller.borrow().options.clone();
    let options = options.borrow();
    params.prepend(options.get_str(config_map::SERIAL_NUMBER));
    params.prepend(0);
    params.prepend(options.get_str(config_map::MODEL_ID));
    Status::Success
}

pub fn get_master(peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    let is_master = controller.borrow().registry.is_master(peer);
    params.prepend(is_master);
    Status::Success
}

pub fn set_master(peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    let Some(master) = params.get(0).and_then(|p| p.as_int()) else {
        return Status::InvalidParameter;
    };
    let mut controller_mut = controller.borrow_mut();
    if master != 0 {
        controller_mut.registry.set_master(peer);
    } else {
        controller_mut.registry.clear_master_if(peer);
        peer.borrow_mut().port_status = PortStatus::Ready;
    }
    Status::Success
}

pub fn get_alive_time(_peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    params.prepend(controller.borrow().alive_time() as i32);
    Status::Success
}

pub fn set_alive_time(peer: &Rc<RefCell<Peer>>, controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    let Some(seconds) = params.get(0).and_then(|p| p.as_int()) else {
        return Status::InvalidParameter;
    };
    if !(1..=60).contains(&seconds) {
        return Status::InvalidParameter;
    }
    controller.borrow_mut().set_alive_time(seconds as u32);
    if peer.borrow().port_status < PortStatus::Ready {
        peer.borrow_mut().port_status = PortStatus::Ready;
    }
    Status::Success
}

pub fn get_ip_address(_peer: &Rc<RefCell<Peer>>, _controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    params.prepend("");
    params.prepend("");
    params.prepend("");
    params.prepend("");
    params.prepend(1);
    Status::Success
}

pub fn set_ip_address(_peer: &Rc<RefCell<Peer>>, _controller: &Rc<RefCell<ControllerInner>>, _params: &mut ParamList) -> Status {
    Status::Continue
}

pub fn get_key_mode(_peer: &Rc<RefCell<Peer>>, _controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    match params.get(0).and_then(|p| p.as_int()) {
        Some(n) if (1..=12).contains(&n) => {}
        _ => return Status::InvalidParameter,
    }
    params.insert(1, 0);
    params.insert(1, 1);
    Status::Success
}

pub fn set_key_mode(_peer: &Rc<RefCell<Peer>>, _controller: &Rc<RefCell<ControllerInner>>, params: &mut ParamList) -> Status {
    match params.get(0).and_then(|p| p.as_int()) {
        Some(n) if (1..=12).contains(&n) => {}
        _ => return Status::InvalidParameter,
    }
    match params.get(1).and_then(|p| p.as_int()) {
        Some(1) => {}
        _ => return Status::InvalidParameter,
    }
    if params.get(2).and_then(|p| p.as_int()).is_none() {
        return Status::InvalidParameter;
    }
    Status::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use mom_protocol::Param;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn test_peer(controller: &Controller) -> Rc<RefCell<Peer>> {
        Peer::new(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4321), Rc::downgrade(&controller.0))
    }

    #[test]
    fn get_device_id_prepends_id_then_name() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut params = ParamList::new();
        assert_eq!(get_device_id(&peer, &controller.0, &mut params), Status::Success);
        assert_eq!(params.get(0), Some(&Param::Int(10)));
        assert_eq!(params.get(1), Some(&Param::Str("MOM".to_owned())));
    }

    #[test]
    fn get_hardware_config_rejects_wrong_version() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut params = ParamList::from_vec(vec![Param::Int(3)]);
        assert_eq!(get_hardware_config(&peer, &controller.0, &mut params), Status::InvalidParameter);
    }

    #[test]
    fn get_hardware_config_orders_params_per_insert_at_one() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut params = ParamList::from_vec(vec![Param::Int(2)]);
        assert_eq!(get_hardware_config(&peer, &controller.0, &mut params), Status::Success);
        assert_eq!(
            params.into_vec(),
            vec![
                Param::Int(2),
                Param::Int(1),
                Param::Str("710100A   171127".to_owned()),
                Param::Str("71000000000".to_owned()),
            ]
        );
    }

    #[test]
    fn get_device_info_orders_model_zero_serial() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut params = ParamList::new();
        get_device_info(&peer, &controller.0, &mut params);
        assert_eq!(
            params.into_vec(),
            vec![
                Param::Str("710".to_owned()),
                Param::Int(0),
                Param::Str("71000000000".to_owned()),
            ]
        );
    }

    #[test]
    fn get_ip_address_orders_dhcp_ip_mask_router_mac() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut params = ParamList::new();
        get_ip_address(&peer, &controller.0, &mut params);
        assert_eq!(
            params.into_vec(),
            vec![
                Param::Int(1),
                Param::Str(String::new()),
                Param::Str(String::new()),
                Param::Str(String::new()),
                Param::Str(String::new()),
            ]
        );
    }

    #[test]
    fn get_key_mode_validates_range_and_orders_params() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut params = ParamList::from_vec(vec![Param::Int(3)]);
        get_key_mode(&peer, &controller.0, &mut params);
        assert_eq!(
            params.into_vec(),
            vec![Param::Int(3), Param::Int(1), Param::Int(0)]
        );

        let mut out_of_range = ParamList::from_vec(vec![Param::Int(13)]);
        assert_eq!(get_key_mode(&peer, &controller.0, &mut out_of_range), Status::InvalidParameter);
    }

    #[test]
    fn set_master_elects_and_connects() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        controller.0.borrow_mut().registry.insert(Rc::clone(&peer));
        let mut params = ParamList::from_vec(vec![Param::Int(1)]);
        assert_eq!(set_master(&peer, &controller.0, &mut params), Status::Success);
        assert_eq!(peer.borrow().port_status, PortStatus::Connected);
        assert!(controller.0.borrow().registry.is_master(&peer));
    }

    #[test]
    fn set_alive_time_rejects_out_of_range() {
        let controller = Controller::create(Default::default(), Box::new(crate::app_handler::NoopApplicationHandler));
        let peer = test_peer(&controller);
        let mut too_big = ParamList::from_vec(vec![Param::Int(61)]);
        assert_eq!(set_alive_time(&peer, &controller.0, &mut too_big), Status::InvalidParameter);
        let mut too_small = ParamList::from_vec(vec![Param::Int(0)]);
        assert_eq!(set_alive_time(&peer, &controller.0, &mut too_small), Status::InvalidParameter);
    }
}

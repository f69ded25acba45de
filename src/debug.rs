use crate::VehicleId;
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Records the MOBIL balance of a lane change evaluated this frame.
#[allow(unused)]
pub fn debug_balance(vehicle: VehicleId, from: usize, to: usize, balance: f64) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        let forbidden = balance == crate::LANE_CHANGE_FORBIDDEN;
        let value = (!forbidden).then_some(balance);
        frame.borrow_mut().push(json!({
            "type": "balance",
            "vehicle": vehicle,
            "from": from,
            "to": to,
            "forbidden": forbidden,
            "balance": value,
        }))
    })
}

/// Records a lane change committed this frame.
#[allow(unused)]
pub fn debug_lane_change(vehicle: VehicleId, from: usize, to: usize) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "lane_change",
            "vehicle": vehicle,
            "from": from,
            "to": to,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}

//! 编解码属性测试
//!
//! 任意输入都不能让解码器 panic；合法状态帧的每个元素都必须原样还原。

use proptest::prelude::*;
use rdk_protocol::{
    JOINT_DOF, Message, RobotStates, StateFeed, StatusFlags, decode_message, encode_state_feed,
};

proptest! {
    /// 任意字节序列：解码只返回错误，不 panic
    #[test]
    fn decode_arbitrary_bytes_never_panics(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let _ = decode_message(&data);
    }

    /// 伪造合法消息头 + 随机消息体
    #[test]
    fn decode_valid_header_random_body_never_panics(
        msg_type in prop::sample::select(vec![0x00u8, 0x01, 0x02, 0x10, 0x11, 0x81, 0x82, 0x83, 0x85, 0xFF]),
        body in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut data = vec![msg_type, 0, 0, 0, 0, 1, 0, 0];
        data.extend_from_slice(&body);
        let len = data.len() as u16;
        data[2..4].copy_from_slice(&len.to_le_bytes());
        let _ = decode_message(&data);
    }

    /// 状态帧中的关节数组完整保留
    #[test]
    fn state_feed_preserves_joint_arrays(
        q in proptest::array::uniform7(-3.2..3.2f64),
        tau in proptest::array::uniform7(-100.0..100.0f64),
        cycle in 1u64..u64::MAX,
        status in any::<u8>(),
    ) {
        let mut states = RobotStates::default();
        states.q = q;
        states.tau = tau;
        let feed = StateFeed {
            cycle,
            timestamp_us: cycle * 1000,
            status: StatusFlags::from_byte(status),
            states,
        };

        let encoded = encode_state_feed(&feed).unwrap();
        let (_, message) = decode_message(&encoded).unwrap();
        match message {
            Message::StateFeed(decoded) => {
                prop_assert_eq!(decoded.cycle, cycle);
                prop_assert_eq!(decoded.status.to_byte(), status);
                for i in 0..JOINT_DOF {
                    prop_assert_eq!(decoded.states.q[i], q[i]);
                    prop_assert_eq!(decoded.states.tau[i], tau[i]);
                }
            },
            other => prop_assert!(false, "unexpected message {:?}", other),
        }
    }
}

#[cfg(feature = "serde")]
#[test]
fn robot_states_serialize_full_arrays() {
    let mut states = RobotStates::default();
    states.q = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
    let json = serde_json::to_value(states).unwrap();
    assert_eq!(json["q"].as_array().unwrap().len(), JOINT_DOF);
    assert_eq!(json["tcp_pose"][3], 1.0);
}

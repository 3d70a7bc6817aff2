use proptest::prelude::*;

use ticketline::{
    core::manager::QueueManager,
    inventory::AvailabilityMode,
    persist::memory::MemoryStorage,
    types::{Inventory, TicketStatus, TicketType},
};

#[derive(Debug, Clone)]
enum Action {
    Register { name_idx: u8, vip: bool },
    ProcessNext,
    ProcessAll,
    Cancel { name_idx: u8, vip: bool },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0u8..12, any::<bool>()).prop_map(|(name_idx, vip)| Action::Register { name_idx, vip }),
        2 => Just(Action::ProcessNext),
        1 => Just(Action::ProcessAll),
        2 => (0u8..12, any::<bool>()).prop_map(|(name_idx, vip)| Action::Cancel { name_idx, vip }),
    ]
}

fn type_name(vip: bool) -> &'static str {
    if vip { "VIP" } else { "Regular" }
}

fn mode_strategy() -> impl Strategy<Value = AvailabilityMode> {
    prop_oneof![Just(AvailabilityMode::Replay), Just(AvailabilityMode::Counter)]
}

proptest! {
    #[test]
    fn registration_position_counts_earlier_same_type_entries(types in prop::collection::vec(any::<bool>(), 1..60)) {
        let mut m = QueueManager::new(MemoryStorage::new(), Inventory::default(), AvailabilityMode::Replay);
        let mut vip_seen = 0usize;
        let mut regular_seen = 0usize;

        for (i, vip) in types.iter().copied().enumerate() {
            let reg = m.register(&format!("P{i}"), "X", type_name(vip)).unwrap();
            let seen = if vip { &mut vip_seen } else { &mut regular_seen };
            *seen += 1;
            prop_assert_eq!(reg.position, *seen);
            prop_assert_eq!(reg.queue_length, i + 1);
        }

        let status = m.queue_status().unwrap();
        prop_assert_eq!(status.vip_queue, vip_seen);
        prop_assert_eq!(status.regular_queue, regular_seen);
    }

    #[test]
    fn random_sequences_never_oversell(
        vip in 0u32..4,
        regular in 0u32..6,
        mode in mode_strategy(),
        actions in prop::collection::vec(action_strategy(), 1..120),
    ) {
        let inventory = Inventory::new(vip, regular);
        let mut m = QueueManager::new(MemoryStorage::new(), inventory, mode);

        for action in actions {
            match action {
                Action::Register { name_idx, vip } => {
                    m.register(&format!("N{name_idx}"), "X", type_name(vip)).unwrap();
                }
                Action::ProcessNext => {
                    let vip_waiting = m.queue_status().unwrap().vip_queue > 0;
                    if let Some(p) = m.process_next().unwrap() {
                        prop_assert_eq!(p.record.ticket_type == TicketType::Vip, vip_waiting);
                    }
                }
                Action::ProcessAll => {
                    m.process_all().unwrap();
                    prop_assert_eq!(m.queue_status().unwrap().vip_queue, 0);
                    prop_assert_eq!(m.queue_status().unwrap().regular_queue, 0);
                }
                Action::Cancel { name_idx, vip } => {
                    let _ = m.cancel(&format!("N{name_idx}"), "X", type_name(vip));
                }
            }

            let available = m.availability().unwrap();
            for ty in TicketType::ALL {
                let net_confirmed: i64 = m
                    .transactions()
                    .unwrap()
                    .iter()
                    .filter(|s| s.record.ticket_type == ty)
                    .map(|s| match s.record.status {
                        TicketStatus::Confirmed => 1,
                        TicketStatus::Cancelled => -1,
                        TicketStatus::SoldOut => 0,
                    })
                    .sum();
                prop_assert!(net_confirmed >= 0);
                prop_assert!(net_confirmed <= i64::from(inventory.total(ty)));
                prop_assert!(available.get(ty) <= inventory.total(ty));
                prop_assert_eq!(
                    i64::from(available.get(ty)),
                    i64::from(inventory.total(ty)) - net_confirmed
                );
            }
        }
    }

    #[test]
    fn availability_reads_do_not_change_state(
        mode in mode_strategy(),
        regs in prop::collection::vec(any::<bool>(), 0..20),
    ) {
        let mut m = QueueManager::new(MemoryStorage::new(), Inventory::new(2, 3), mode);
        for (i, vip) in regs.iter().copied().enumerate() {
            m.register(&format!("P{i}"), "X", type_name(vip)).unwrap();
        }
        m.process_all().unwrap();

        let first = m.availability().unwrap();
        let log_len = m.transactions().unwrap().len();
        for _ in 0..3 {
            prop_assert_eq!(m.availability().unwrap(), first);
        }
        prop_assert_eq!(m.transactions().unwrap().len(), log_len);
    }
}

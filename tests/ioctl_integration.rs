//! Management command path: decode request bytes, execute against the
//! store, encode the reply

use namenode_blockstore::{
    BlockInfo, BlockStore, BlockStoreBuilder, ClassStat, DataNodeInfo, IoctlCommand, IoctlReply,
    RpcStatus, BLOCK_INFO_SIZE, DATANODE_INFO_SIZE,
};
use std::net::Ipv4Addr;
use std::sync::Arc;

fn handle(store: &BlockStore, request: &[u8]) -> (RpcStatus, Vec<u8>) {
    let command = IoctlCommand::from_bytes(request).unwrap();
    let response = store.ioctl(&command);
    (response.status, response.reply.to_bytes())
}

fn populated_store() -> (BlockStore, DataNodeInfo) {
    let store = BlockStoreBuilder::new().storage_classes(2).build().unwrap();
    let dn = DataNodeInfo::new(Ipv4Addr::new(10, 1, 2, 3), 50020, 1, 4, 0);
    for addr in 0..8 {
        store
            .add_block(Arc::new(BlockInfo::new(dn, addr << 20, 1 << 20, 1)))
            .unwrap();
    }
    (store, dn)
}

#[test]
fn test_nop() {
    let (store, _) = populated_store();
    let (status, reply) = handle(&store, &[1]);
    assert!(status.is_ok());
    assert_eq!(IoctlReply::from_bytes(&reply).unwrap(), IoctlReply::Nop);
}

#[test]
fn test_class_stat_over_the_wire() {
    let (store, _) = populated_store();
    for _ in 0..3 {
        store.try_get_block(1, 0).unwrap();
    }

    let request = IoctlCommand::GetClassStat { storage_class: 1 }.to_bytes();
    let (status, reply) = handle(&store, &request);
    assert_eq!(status, RpcStatus::Ok);
    assert_eq!(
        IoctlReply::from_bytes(&reply).unwrap(),
        IoctlReply::ClassStat(ClassStat {
            all_blocks: 8,
            consumed_blocks: 3
        })
    );

    let (status, _) = handle(&store, &IoctlCommand::GetClassStat { storage_class: 0 }.to_bytes());
    assert_eq!(status, RpcStatus::Ok);
}

#[test]
fn test_class_stat_unknown_class() {
    let (store, _) = populated_store();
    let (status, reply) = handle(&store, &[3, 0, 0, 0, 9]);
    assert_eq!(status, RpcStatus::InvalidStorageClass);
    assert_eq!(
        IoctlReply::from_bytes(&reply).unwrap(),
        IoctlReply::ClassStat(ClassStat::default())
    );
}

#[test]
fn test_remove_datanode_over_the_wire() {
    let (store, dn) = populated_store();

    let mut request = vec![2];
    request.extend_from_slice(&dn.ip_address);
    request.extend_from_slice(&dn.port.to_be_bytes());

    let (status, reply) = handle(&store, &request);
    assert_eq!(status, RpcStatus::Ok);
    assert_eq!(
        IoctlReply::from_bytes(&reply).unwrap(),
        IoctlReply::DataNodeRemoved
    );
    assert!(store.get_datanode(&dn).unwrap().is_none());
    assert!(store.try_get_block(1, 0).is_none());

    // second removal reports the missing DataNode in the status only
    let (status, reply) = handle(&store, &request);
    assert_eq!(status, RpcStatus::DataNodeNotRegistered);
    assert_eq!(RpcStatus::from_i16(status as i16), status);
    assert_eq!(reply, vec![2]);
}

#[test]
fn test_remove_matches_address_and_port_only() {
    let (store, dn) = populated_store();
    let other_port = IoctlCommand::RemoveDataNode {
        address: dn.ip(),
        port: dn.port + 1,
    };
    assert_eq!(store.ioctl(&other_port).status, RpcStatus::DataNodeNotRegistered);
    assert!(store.get_datanode(&dn).unwrap().is_some());
}

#[test]
fn test_records_survive_the_wire() {
    let dn = DataNodeInfo::new(Ipv4Addr::new(10, 9, 8, 7), 7000, 1, 2, 3);
    let bytes = dn.to_bytes();
    assert_eq!(bytes.len(), DATANODE_INFO_SIZE);
    assert_eq!(DataNodeInfo::from_bytes(&bytes).unwrap(), dn);

    let block = BlockInfo::new(dn, 0xdead_beef_0000, 4096, 77);
    let bytes = block.to_bytes();
    assert_eq!(bytes.len(), BLOCK_INFO_SIZE);
    let decoded = BlockInfo::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.datanode(), &dn);
    assert_eq!(decoded.addr(), 0xdead_beef_0000);
    assert_eq!(decoded.lkey(), 77);
    assert!(!decoded.is_deleted());
}

#[test]
fn test_malformed_requests_rejected() {
    assert!(IoctlCommand::from_bytes(&[]).is_err());
    assert!(IoctlCommand::from_bytes(&[9]).is_err());
    assert!(IoctlCommand::from_bytes(&[2, 10, 1, 2, 3, 0]).is_err());
    assert!(IoctlCommand::from_bytes(&[3, 0]).is_err());
}

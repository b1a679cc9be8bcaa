//! # Archetype World Integration Test
//!
//! Spawns, migrates and despawns many entities and checks that the
//! directory follows every row move.

use bytemuck::{Pod, Zeroable};
use tessera_core::{ArchetypeWorld, Component, EntityId, StorageConfig, StorageError};

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

impl Component for Position {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Tag(u32);

impl Component for Tag {}

fn assert_directory_consistent(world: &ArchetypeWorld, alive: &[EntityId]) {
    for &id in alive {
        let address = world.locate(id).expect("alive entity has an address");
        let list = world.chunk_list(address.chunk.archetype).unwrap();
        let chunk = list.chunk(address.chunk.position).unwrap();
        assert_eq!(chunk.entity_id(address.index), Some(id));
        assert_eq!(chunk.entity_record(address.index).unwrap().address(), address);
    }
    let stored: usize = world.chunk_lists().map(|list| list.entity_count()).sum();
    assert_eq!(stored, alive.len());
    assert_eq!(world.len(), alive.len());
}

/// Test: Churn across two archetypes keeps every id resolvable.
#[test]
fn test_churn_keeps_directory_consistent() {
    // Small chunks so the chains grow several links.
    let mut world = ArchetypeWorld::new(StorageConfig::with_chunk_size(512)).unwrap();
    let mut alive = Vec::new();
    let mut state = 0x2545_F491_4F6C_DD1Du64;

    for step in 0..3_000u32 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        match state % 5 {
            0 | 1 => {
                let id = world
                    .spawn(&[(Position::id(), Position::size())])
                    .unwrap();
                let f = step as f32;
                world.set(id, Position { x: f, y: f, z: f }).unwrap();
                alive.push(id);
            }
            2 if !alive.is_empty() => {
                let id = alive.swap_remove((state >> 8) as usize % alive.len());
                world.despawn(id).unwrap();
            }
            3 if !alive.is_empty() => {
                let id = alive[(state >> 8) as usize % alive.len()];
                world.insert(id, Tag(step)).unwrap();
            }
            4 if !alive.is_empty() => {
                let id = alive[(state >> 8) as usize % alive.len()];
                world.remove::<Tag>(id).unwrap();
            }
            _ => {}
        }
    }

    assert_directory_consistent(&world, &alive);
    assert!(world.archetype_count() <= 2);
}

/// Test: Migration carries component values both ways.
#[test]
fn test_round_trip_migration_preserves_values() {
    let mut world = ArchetypeWorld::new(StorageConfig::default()).unwrap();
    let ids: Vec<_> = (0..50)
        .map(|i| {
            let id = world.spawn(&[(Position::id(), Position::size())]).unwrap();
            let f = i as f32;
            world.set(id, Position { x: f, y: 0.0, z: -f }).unwrap();
            id
        })
        .collect();

    for &id in ids.iter().step_by(2) {
        world.insert(id, Tag(id.index())).unwrap();
    }
    for &id in ids.iter().step_by(4) {
        assert!(world.remove::<Tag>(id).unwrap());
    }

    for (i, &id) in ids.iter().enumerate() {
        let f = i as f32;
        assert_eq!(world.get::<Position>(id), Some(Position { x: f, y: 0.0, z: -f }));
        let tagged = i % 2 == 0 && i % 4 != 0;
        assert_eq!(world.get::<Tag>(id).is_some(), tagged);
    }
    assert_directory_consistent(&world, &ids);
}

/// Test: Stale ids are rejected after their slot is reused.
#[test]
fn test_stale_id_after_reuse() {
    let mut world = ArchetypeWorld::new(StorageConfig::default()).unwrap();
    let old = world.spawn(&[]).unwrap();
    world.despawn(old).unwrap();
    let new = world.spawn(&[]).unwrap();

    assert_eq!(new.index(), old.index());
    assert!(world.is_alive(new));
    assert!(!world.is_alive(old));
    assert_eq!(world.despawn(old), Err(StorageError::NoSuchEntity(old)));
}

/// Test: A TOML config drives the chunk size of new archetypes.
#[test]
fn test_world_from_toml_config() {
    let config = StorageConfig::from_toml_str("chunk_size = 2048").unwrap();
    let mut world = ArchetypeWorld::new(config).unwrap();
    let id = world.spawn(&[(Tag::id(), Tag::size())]).unwrap();

    let archetype = world.archetype_of(id).unwrap();
    assert_eq!(world.chunk_list(archetype).unwrap().layout().chunk_size(), 2048);
}

//! Shared game-model fixtures for the integration suites
//!
//! A minimal wargame: a `Board`, an `Infantry` unit, and a `Tank`, each with
//! movement/attack instructions and the action-budget and board-bounds
//! constraints.

#![allow(dead_code)]

use lamina::{
    ArgKind, AttrDescriptor, Constraint, Error, FixedTuple, Kwargs, MemberInstruction,
    ModelInstance, ModelSchema, Value, Vm,
};

/// A VM with the Board, Infantry, and Tank schemas registered
pub fn new_game_vm() -> Vm {
    let mut vm = Vm::new();
    vm.register_model(board_schema()).unwrap();
    vm.register_model(infantry_schema()).unwrap();
    vm.register_model(tank_schema()).unwrap();
    vm
}

pub fn board_schema() -> ModelSchema {
    ModelSchema::builder("Board")
        .attr(AttrDescriptor::int("width"))
        .attr(AttrDescriptor::int("height"))
        .build()
        .unwrap()
}

pub fn infantry_schema() -> ModelSchema {
    ModelSchema::builder("Infantry")
        .attr(AttrDescriptor::int("n_units"))
        .attr(AttrDescriptor::int("attack_dmg"))
        .attr(AttrDescriptor::int("armor"))
        .attr(AttrDescriptor::int("health"))
        .attr(AttrDescriptor::int("action"))
        .attr(AttrDescriptor::string("tag").nullable())
        .attr(AttrDescriptor::tuple("position", 2).default_value((0, 0)))
        .attr(AttrDescriptor::foreign("board", "Board"))
        .instruction(MemberInstruction::new(
            "move",
            101,
            "INF.MOVE",
            vec![ArgKind::Int, ArgKind::Int],
            |vm, this, args| {
                if this.get(vm, "health")?.as_int().unwrap_or(0) <= 0 {
                    return Err(Error::bad_call("INF.MOVE", "cannot move dead infantry"));
                }
                let position = this.get_tuple(vm, "position")?;
                let x = args[0].as_int().unwrap_or(0);
                let y = args[1].as_int().unwrap_or(0);
                let cost = travel_cost(&position, x, y);
                let action = this.get(vm, "action")?.as_int().unwrap_or(0);
                this.set(vm, "action", action - cost)?;
                this.set(vm, "position", (x, y))
            },
        ))
        .instruction(MemberInstruction::new(
            "attack",
            102,
            "INF.ATTK",
            vec![ArgKind::ModelInstance],
            |vm, this, args| {
                let other = args[0]
                    .instance()
                    .ok_or_else(|| Error::bad_call("INF.ATTK", "target must be an instance"))?;
                let here = this.get_tuple(vm, "position")?;
                let there = other.get_tuple(vm, "position")?;
                let tx = there.x().and_then(Value::as_int).unwrap_or(0);
                let ty = there.y().and_then(Value::as_int).unwrap_or(0);
                if travel_cost(&here, tx, ty) > 3 {
                    return Err(Error::bad_call(
                        "INF.ATTK",
                        "cannot attack more than 3 units away",
                    ));
                }
                let action = this.get(vm, "action")?.as_int().unwrap_or(0);
                this.set(vm, "action", action - 10)?;
                let dmg = this.get(vm, "attack_dmg")?.as_int().unwrap_or(0)
                    * this.get(vm, "n_units")?.as_int().unwrap_or(0)
                    - other.get(vm, "armor")?.as_int().unwrap_or(0);
                let health = other.get(vm, "health")?.as_int().unwrap_or(0);
                other.set(vm, "health", health - dmg)
            },
        ))
        .constraint("action", action_limit())
        .constraint("position", board_bounds())
        .build()
        .unwrap()
}

pub fn tank_schema() -> ModelSchema {
    ModelSchema::builder("Tank")
        .attr(AttrDescriptor::int("attack_dmg"))
        .attr(AttrDescriptor::int("armor"))
        .attr(AttrDescriptor::int("health"))
        .attr(AttrDescriptor::int("action"))
        .attr(AttrDescriptor::string("tag").nullable())
        .attr(AttrDescriptor::tuple("position", 2).default_value((0, 0)))
        .attr(AttrDescriptor::foreign("board", "Board"))
        .instruction(MemberInstruction::new(
            "move",
            201,
            "TANK.MOVE",
            vec![ArgKind::Int, ArgKind::Int],
            |vm, this, args| {
                let position = this.get_tuple(vm, "position")?;
                let x = args[0].as_int().unwrap_or(0);
                let y = args[1].as_int().unwrap_or(0);
                let cost = travel_cost(&position, x, y);
                let action = this.get(vm, "action")?.as_int().unwrap_or(0);
                this.set(vm, "action", action - cost)?;
                this.set(vm, "position", (x, y))
            },
        ))
        .instruction(MemberInstruction::new(
            "attack",
            202,
            "TANK.ATTK",
            vec![ArgKind::ModelInstance],
            |vm, this, args| {
                let other = args[0]
                    .instance()
                    .ok_or_else(|| Error::bad_call("TANK.ATTK", "target must be an instance"))?;
                let action = this.get(vm, "action")?.as_int().unwrap_or(0);
                this.set(vm, "action", action - 10)?;
                let dmg = this.get(vm, "attack_dmg")?.as_int().unwrap_or(0)
                    - other.get(vm, "armor")?.as_int().unwrap_or(0);
                let health = other.get(vm, "health")?.as_int().unwrap_or(0);
                other.set(vm, "health", health - dmg)
            },
        ))
        .constraint("action", action_limit())
        .constraint("position", board_bounds())
        .build()
        .unwrap()
}

/// The action budget can never go negative.
fn action_limit() -> Constraint {
    Constraint::on_change("action_limit", &[], |ctx| {
        ctx.new.as_int().map(|n| n >= 0).unwrap_or(false)
    })
}

/// Positions must stay within the owning board.
fn board_bounds() -> Constraint {
    Constraint::on_change("board_bounds", &["board"], |ctx| {
        let Some(position) = FixedTuple::from_value(2, &ctx.new) else {
            return false;
        };
        let (Some(x), Some(y)) = (
            position.x().and_then(Value::as_int),
            position.y().and_then(Value::as_int),
        ) else {
            return false;
        };
        if x < 0 || y < 0 {
            return false;
        }
        let Some(board) = ctx.related_ref("board") else {
            return false;
        };
        let width = board
            .get(ctx.vm, "width")
            .ok()
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        let height = board
            .get(ctx.vm, "height")
            .ok()
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        x < width && y < height
    })
}

/// Euclidean travel cost, rounded up
fn travel_cost(from: &FixedTuple, x: i64, y: i64) -> i64 {
    let fx = from.x().and_then(Value::as_int).unwrap_or(0);
    let fy = from.y().and_then(Value::as_int).unwrap_or(0);
    let squared = (x - fx).pow(2) + (y - fy).pow(2);
    (squared as f64).sqrt().ceil() as i64
}

pub fn spawn_board(vm: &Vm, width: i64, height: i64) -> ModelInstance {
    vm.instantiate(
        "Board",
        Kwargs::new().set("width", width).set("height", height),
    )
    .unwrap()
}

pub fn spawn_infantry(
    vm: &Vm,
    board: &ModelInstance,
    health: i64,
    action: i64,
) -> ModelInstance {
    vm.instantiate(
        "Infantry",
        Kwargs::new()
            .set("n_units", 1)
            .set("attack_dmg", 1)
            .set("armor", 0)
            .set("health", health)
            .set("action", action)
            .set("position", (1, 1))
            .set_ref("board", board),
    )
    .unwrap()
}

//! Product commands.
//!
//! Quantities are signed on the way in so that negative requests reach the
//! aggregate and are rejected there.

use crate::command::Command;

/// Command to create a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProduct {
    /// Display name, must not be blank.
    pub name: String,

    /// Starting stock level, must not be negative.
    pub initial_quantity: i64,
}

impl CreateProduct {
    /// Creates a new CreateProduct command.
    pub fn new(name: impl Into<String>, initial_quantity: i64) -> Self {
        Self {
            name: name.into(),
            initial_quantity,
        }
    }
}

/// Command to add units to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddInventory {
    /// Units to add, must be positive.
    pub quantity: i64,
}

impl AddInventory {
    /// Creates a new AddInventory command.
    pub fn new(quantity: i64) -> Self {
        Self { quantity }
    }
}

/// Command to take units out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveInventory {
    /// Units to remove, must be positive and not exceed the stock.
    pub quantity: i64,
}

impl RemoveInventory {
    /// Creates a new RemoveInventory command.
    pub fn new(quantity: i64) -> Self {
        Self { quantity }
    }
}

/// The closed set of commands accepted by the product aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductCommand {
    Create(CreateProduct),
    AddInventory(AddInventory),
    RemoveInventory(RemoveInventory),
}

impl Command for ProductCommand {
    fn command_type(&self) -> &'static str {
        match self {
            ProductCommand::Create(_) => "CreateProduct",
            ProductCommand::AddInventory(_) => "AddInventory",
            ProductCommand::RemoveInventory(_) => "RemoveInventory",
        }
    }
}

impl From<CreateProduct> for ProductCommand {
    fn from(cmd: CreateProduct) -> Self {
        ProductCommand::Create(cmd)
    }
}

impl From<AddInventory> for ProductCommand {
    fn from(cmd: AddInventory) -> Self {
        ProductCommand::AddInventory(cmd)
    }
}

impl From<RemoveInventory> for ProductCommand {
    fn from(cmd: RemoveInventory) -> Self {
        ProductCommand::RemoveInventory(cmd)
    }
}

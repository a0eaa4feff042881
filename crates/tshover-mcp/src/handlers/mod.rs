mod hover;
mod introspection;
